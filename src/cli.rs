use crate::book::book_status_line;
use crate::command::{Command, HELP};
use crate::config::Config;
use crate::engine::{self, EngineKind, Mover};
use crate::error::PgnError;
use crate::game::{color_name, Game, Outcome};
use crate::pgn::{self, PgnGame};
use crate::session::{Session, SessionState};
use anyhow::Result;
use chrono::{Local, NaiveDate};
use shakmaty::Color;
use std::io::{BufRead, Write};

const LOBBY: &str = "Lobby. Type 'start' to play.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

/// The interactive front end: reads commands line by line and prints plain text.
pub struct Console<R, W> {
    input: R,
    output: W,
    session: Session,
    config: Config,
}

impl<R: BufRead, W: Write> Console<R, W> {
    pub fn new(input: R, output: W, config: Config) -> Result<Self> {
        let session = Session::new(config.session_settings()?, config.load_book());
        Ok(Self {
            input,
            output,
            session,
            config,
        })
    }

    pub fn into_output(self) -> W {
        self.output
    }

    pub fn run(&mut self) -> Result<()> {
        writeln!(self.output, "\nBlindfold Chess\n")?;
        writeln!(self.output, "{HELP}")?;
        let book = self.session.has_book().then(|| self.config.book.as_path());
        writeln!(self.output, "{}", book_status_line(book, self.config.book_chance))?;
        writeln!(self.output)?;

        loop {
            let flow = match self.session.state() {
                SessionState::Lobby => self.lobby()?,
                SessionState::AwaitingHumanMove => self.human_turn()?,
                SessionState::AwaitingEngineMove => self.engine_turn()?,
                SessionState::Ended => self.wrap_up()?,
            };
            if flow == Flow::Quit {
                break;
            }
        }
        self.session.quit();
        Ok(())
    }

    /// `None` on end of input.
    fn prompt(&mut self, prompt: &str) -> Result<Option<String>> {
        write!(self.output, "{prompt}")?;
        self.output.flush()?;
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            writeln!(self.output)?;
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }

    fn ask_yes_no(&mut self, question: &str) -> Result<bool> {
        loop {
            let Some(answer) = self.prompt(&format!("{question} [y/N]: "))? else {
                return Ok(false);
            };
            match answer.to_lowercase().as_str() {
                "" | "n" | "no" => return Ok(false),
                "y" | "yes" => return Ok(true),
                _ => writeln!(self.output, "Please answer y or n.")?,
            }
        }
    }

    fn goodbye(&mut self) -> Result<Flow> {
        writeln!(self.output, "Goodbye.")?;
        Ok(Flow::Quit)
    }

    fn lobby(&mut self) -> Result<Flow> {
        let Some(line) = self.prompt("> ")? else {
            return self.goodbye();
        };
        match Command::parse(&line) {
            None => {}
            Some(Command::Start) => return self.start_game(),
            Some(Command::Help) => writeln!(self.output, "{HELP}\n")?,
            Some(Command::Quit) => return self.goodbye(),
            Some(_) => writeln!(self.output, "No active game. Type 'start' (or 'help', 'quit').")?,
        }
        Ok(Flow::Continue)
    }

    fn start_game(&mut self) -> Result<Flow> {
        let Some((kind, mover)) = self.choose_engine()? else {
            return self.goodbye();
        };
        let Some(color) = self.choose_color()? else {
            return self.goodbye();
        };
        self.session.start(kind, mover, color)?;
        let opponent = self.session.game().map(Game::opponent).unwrap_or_default();

        writeln!(self.output)?;
        writeln!(self.output, "You: {} vs {}", color_name(color), opponent)?;
        writeln!(self.output, "Tip: type 'show' to display the board.")?;
        writeln!(self.output)?;
        Ok(Flow::Continue)
    }

    fn choose_engine(&mut self) -> Result<Option<(EngineKind, Box<dyn Mover>)>> {
        writeln!(self.output, "Choose engine:")?;
        for (i, kind) in EngineKind::ALL.iter().enumerate() {
            writeln!(self.output, "  {}. {}", i + 1, kind)?;
        }
        loop {
            let Some(choice) = self.prompt("engine> ")? else {
                return Ok(None);
            };
            let Some(kind) = EngineKind::from_choice(&choice) else {
                writeln!(self.output, "Invalid choice.")?;
                continue;
            };
            if kind != EngineKind::Uci {
                let mover = engine::open(kind, self.session.engine_seed(), None)?;
                return Ok(Some((kind, mover)));
            }
            loop {
                let Some(command) = self.prompt("uci engine path/command> ")? else {
                    return Ok(None);
                };
                match engine::open(kind, 0, Some(&command)) {
                    Ok(mover) => return Ok(Some((kind, mover))),
                    Err(err) => {
                        log::warn!("{err}");
                        writeln!(self.output, "Could not start engine. Try again.")?;
                    }
                }
            }
        }
    }

    fn choose_color(&mut self) -> Result<Option<Color>> {
        writeln!(self.output, "Choose your color:")?;
        writeln!(self.output, "  1. white")?;
        writeln!(self.output, "  2. black")?;
        writeln!(self.output, "  3. random")?;
        loop {
            let Some(choice) = self.prompt("color> ")? else {
                return Ok(None);
            };
            match choice.to_lowercase().as_str() {
                "1" | "white" => return Ok(Some(Color::White)),
                "2" | "black" => return Ok(Some(Color::Black)),
                "3" | "random" => return Ok(Some(self.session.random_color())),
                _ => writeln!(self.output, "Invalid choice.")?,
            }
        }
    }

    fn human_turn(&mut self) -> Result<Flow> {
        let Some(line) = self.prompt("> ")? else {
            return self.goodbye();
        };
        let Some(command) = Command::parse(&line) else {
            return Ok(Flow::Continue);
        };
        let Some(game) = self.session.game() else {
            return Ok(Flow::Continue);
        };

        match command {
            Command::Help => writeln!(self.output, "{HELP}")?,
            Command::Show => writeln!(self.output, "{}", game.board_diagram())?,
            Command::Moves => writeln!(self.output, "{}", game.legal_moves_san().join(" "))?,
            Command::Fen => writeln!(self.output, "{}", game.fen())?,
            Command::Pgn => writeln!(self.output, "{}", render_pgn(game, today()))?,
            Command::Resign => {
                self.session.resign()?;
                writeln!(self.output, "Resigned.")?;
            }
            Command::Quit => return self.goodbye(),
            Command::Start => writeln!(self.output, "Game in progress. Finish or resign first.")?,
            Command::Move(text) => match self.session.submit_move(&text) {
                Ok(report) => self.announce(report.outcome, "Checkmate. You win.")?,
                Err(err) => {
                    log::debug!("rejected `{text}`: {err}");
                    writeln!(self.output, "Illegal move / unknown command.")?;
                }
            },
        }
        Ok(Flow::Continue)
    }

    fn engine_turn(&mut self) -> Result<Flow> {
        match self.session.advance_turn() {
            Ok(Some(report)) => {
                writeln!(self.output, "{}", report.san)?;
                self.announce(report.outcome, "Checkmate.")?;
            }
            Ok(None) => {}
            Err(err) => {
                writeln!(self.output, "Engine failed: {err}")?;
                writeln!(self.output)?;
                writeln!(self.output, "{LOBBY}")?;
            }
        }
        Ok(Flow::Continue)
    }

    fn announce(&mut self, outcome: Option<Outcome>, mate: &str) -> Result<()> {
        match outcome {
            Some(Outcome::Draw(kind)) => writeln!(self.output, "Draw: {kind}")?,
            Some(Outcome::Checkmate { .. }) => writeln!(self.output, "{mate}")?,
            Some(Outcome::Resignation { .. }) | None => {}
        }
        Ok(())
    }

    /// Offer the finished game's PGN, then go back to the lobby.
    fn wrap_up(&mut self) -> Result<Flow> {
        let Some(game) = self.session.finish() else {
            return Ok(Flow::Continue);
        };
        if !game.pgn_text().is_empty() {
            let date = today();
            if self.ask_yes_no("Print final PGN?")? {
                writeln!(self.output)?;
                writeln!(self.output, "Final PGN:")?;
                writeln!(self.output, "{}", render_pgn(&game, date))?;
            }
            if self.ask_yes_no("Save PGN to file?")? {
                self.save(&game, date)?;
            }
        }
        writeln!(self.output)?;
        writeln!(self.output, "{LOBBY}")?;
        Ok(Flow::Continue)
    }

    fn save(&mut self, game: &Game, date: NaiveDate) -> Result<()> {
        let pgn = assemble(game, date)?;
        match pgn::save_pgn(&self.config.pgn_dir, &pgn, game.engine_name(), date) {
            Ok(path) => writeln!(self.output, "Saved {}", path.display())?,
            Err(err) => writeln!(self.output, "Could not save PGN: {err}")?,
        }
        Ok(())
    }
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn assemble(game: &Game, date: NaiveDate) -> Result<PgnGame, PgnError> {
    pgn::assemble(
        game.pgn_text(),
        game.start_position(),
        game.player_color(),
        game.engine_name(),
        date,
    )
}

fn render_pgn(game: &Game, date: NaiveDate) -> String {
    match assemble(game, date) {
        Ok(pgn) => pgn.to_string(),
        Err(err) => {
            log::warn!("movetext did not replay: {err}");
            game.pgn_text().trim_start().to_string()
        }
    }
}
