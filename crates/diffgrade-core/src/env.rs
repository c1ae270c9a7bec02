//! Per-invocation environment: seeded randomness, stdin and captured stdout.
//!
//! Each side of each step gets its own [`InvocationEnv`]. Nothing here is
//! process-global, so one invocation cannot leak captured output or random
//! state into the next.

use std::fmt;
use std::io::{BufRead, Cursor, Read};
use std::path::{Path, PathBuf};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Randomness, input and output handed to a constructor or method.
#[derive(Debug)]
pub struct InvocationEnv {
    rng: StdRng,
    stdin: Cursor<Vec<u8>>,
    stdout: Vec<u8>,
}

impl InvocationEnv {
    /// Seeded when `seed` is given, from OS entropy otherwise.
    pub fn new(seed: Option<u64>, stdin: Vec<u8>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            rng,
            stdin: Cursor::new(stdin),
            stdout: Vec::new(),
        }
    }

    /// Unseeded env with empty stdin, for work outside a matched invocation.
    pub fn detached() -> Self {
        Self::new(None, Vec::new())
    }

    pub fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    /// Uniform integer in `[lo, hi)`; `lo` when the range is empty.
    pub fn uniform(&mut self, lo: i64, hi: i64) -> i64 {
        if hi <= lo {
            lo
        } else {
            self.rng.gen_range(lo..hi)
        }
    }

    /// Uniform real in `[0, 1)`.
    pub fn uniform_f64(&mut self) -> f64 {
        self.rng.gen::<f64>()
    }

    pub fn stdin(&mut self) -> &mut Cursor<Vec<u8>> {
        &mut self.stdin
    }

    /// Next line of stdin without its terminator, or `None` at end of input.
    pub fn read_line(&mut self) -> Option<String> {
        let mut line = String::new();
        match self.stdin.read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => {
                while line.ends_with('\n') || line.ends_with('\r') {
                    line.pop();
                }
                Some(line)
            }
        }
    }

    /// Everything left on stdin. Invalid UTF-8 becomes U+FFFD.
    pub fn read_all(&mut self) -> String {
        let mut rest = Vec::new();
        let _ = self.stdin.read_to_end(&mut rest);
        String::from_utf8_lossy(&rest).into_owned()
    }

    pub fn stdout(&mut self) -> &mut Vec<u8> {
        &mut self.stdout
    }

    pub fn print(&mut self, text: &str) {
        self.stdout.extend_from_slice(text.as_bytes());
    }

    pub fn println(&mut self, text: &str) {
        self.print(text);
        self.stdout.push(b'\n');
    }

    pub fn captured(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn into_captured(self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }
}

/// A named stdin source. Streams are single-use, so the fixture is loaded
/// again for every call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "source", rename_all = "snake_case")]
pub enum StdinFixture {
    /// Contents of a file.
    File(PathBuf),
    /// Literal text.
    Literal(String),
    /// A file when one exists under that name, otherwise the name itself is the input.
    Named(String),
}

impl StdinFixture {
    pub async fn load(&self) -> std::io::Result<Vec<u8>> {
        match self {
            StdinFixture::File(path) => tokio::fs::read(path).await,
            StdinFixture::Literal(text) => Ok(text.clone().into_bytes()),
            StdinFixture::Named(name) => {
                if Path::new(name).is_file() {
                    tokio::fs::read(name).await
                } else {
                    Ok(name.clone().into_bytes())
                }
            }
        }
    }
}

impl fmt::Display for StdinFixture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StdinFixture::File(path) => write!(f, "{}", path.display()),
            StdinFixture::Literal(text) | StdinFixture::Named(text) => f.write_str(text),
        }
    }
}

/// Environmental conditions shared by both sides of one step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Conditions {
    pub seed: Option<u64>,
    pub stdin: Option<StdinFixture>,
}

impl Conditions {
    /// Conditions for step `step` of a spec seeded with `seed`.
    pub fn for_step(seed: Option<u64>, step: u64, stdin: Option<StdinFixture>) -> Self {
        Self {
            seed: seed.map(|s| s.wrapping_add(step)),
            stdin,
        }
    }

    pub async fn stdin_bytes(&self) -> std::io::Result<Vec<u8>> {
        match &self.stdin {
            Some(fixture) => fixture.load().await,
            None => Ok(Vec::new()),
        }
    }
}
