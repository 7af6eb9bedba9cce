use crate::engine::Mover;
use crate::error::EngineError;
use shakmaty::fen::Fen;
use shakmaty::uci::UciMove;
use shakmaty::{Chess, EnPassantMode, Move};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

const QUIT_GRACE: Duration = Duration::from_millis(500);

/// An external engine process driven over the UCI protocol.
///
/// The process lives exactly as long as this value: dropping it asks the
/// engine to quit and kills it if it does not.
pub struct UciEngine {
    child: Child,
    stdin: BufWriter<ChildStdin>,
    stdout: BufReader<ChildStdout>,
    name: String,
}

impl UciEngine {
    /// Start `command` (program and arguments, split with shell quoting rules)
    /// and complete the UCI handshake.
    pub fn spawn(command: &str) -> Result<Self, EngineError> {
        let argv = split_command(command)?;
        let (program, args) = argv.split_first().ok_or(EngineError::EmptyCommand)?;
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| EngineError::Spawn {
                command: command.to_string(),
                source,
            })?;

        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(EngineError::Disconnected { expected: "uciok" });
        };

        let mut engine = UciEngine {
            child,
            stdin: BufWriter::new(stdin),
            stdout: BufReader::new(stdout),
            name: fallback_name(program),
        };
        engine.handshake()?;
        log::info!("started UCI engine `{}` ({})", engine.name, command);
        Ok(engine)
    }

    fn handshake(&mut self) -> Result<(), EngineError> {
        self.send("uci")?;
        loop {
            let line = self.read_line("uciok")?;
            if let Some(name) = line.strip_prefix("id name ") {
                let name = name.trim();
                if !name.is_empty() {
                    self.name = name.to_string();
                }
            } else if line == "uciok" {
                break;
            }
        }
        self.send("ucinewgame")?;
        self.sync()
    }

    fn sync(&mut self) -> Result<(), EngineError> {
        self.send("isready")?;
        while self.read_line("readyok")? != "readyok" {}
        Ok(())
    }

    fn send(&mut self, command: &str) -> Result<(), EngineError> {
        log::debug!("uci > {command}");
        writeln!(self.stdin, "{command}")?;
        self.stdin.flush()?;
        Ok(())
    }

    fn read_line(&mut self, expected: &'static str) -> Result<String, EngineError> {
        let mut line = String::new();
        if self.stdout.read_line(&mut line)? == 0 {
            return Err(EngineError::Disconnected { expected });
        }
        let line = line.trim().to_string();
        log::trace!("uci < {line}");
        Ok(line)
    }

    pub fn best_move(&mut self, position: &Chess, movetime: Duration) -> Result<Move, EngineError> {
        let fen = Fen::from_position(position.clone(), EnPassantMode::Legal);
        self.send(&format!("position fen {fen}"))?;
        self.send(&format!("go movetime {}", movetime.as_millis().max(1)))?;

        loop {
            let line = self.read_line("bestmove")?;
            let mut tokens = line.split_whitespace();
            if tokens.next() != Some("bestmove") {
                continue;
            }
            return match tokens.next() {
                None | Some("(none)") | Some("0000") => Err(EngineError::NoMove),
                Some(text) => parse_move(text, position),
            };
        }
    }
}

fn split_command(command: &str) -> Result<Vec<String>, EngineError> {
    shlex::split(command)
        .filter(|argv| !argv.is_empty())
        .ok_or(EngineError::EmptyCommand)
}

fn parse_move(text: &str, position: &Chess) -> Result<Move, EngineError> {
    let bad = || EngineError::BadMove(text.to_string());
    let uci = text.parse::<UciMove>().map_err(|_| bad())?;
    uci.to_move(position).map_err(|_| bad())
}

fn fallback_name(program: &str) -> String {
    Path::new(program)
        .file_name()
        .and_then(|name| name.to_str())
        .filter(|name| !name.is_empty())
        .unwrap_or("UCI")
        .to_string()
}

impl Mover for UciEngine {
    fn name(&self) -> &str {
        &self.name
    }

    fn propose(&mut self, position: &Chess, budget: Duration) -> Result<Move, EngineError> {
        self.best_move(position, budget)
    }
}

impl Drop for UciEngine {
    fn drop(&mut self) {
        let _ = self.send("quit");
        let deadline = Instant::now() + QUIT_GRACE;
        loop {
            match self.child.try_wait() {
                Ok(Some(_)) => return,
                Ok(None) if Instant::now() < deadline => thread::sleep(Duration::from_millis(10)),
                _ => break,
            }
        }
        log::warn!("engine `{}` ignored quit, killing it", self.name);
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}
