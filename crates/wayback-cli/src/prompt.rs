use std::io::{self, BufRead, Write};
use wayback_model::{DateRange, SnapshotId};

/// How the user wants to pick captures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    Range,
    All,
}

/// Line-oriented questions on a terminal (or anything readable/writable).
///
/// Invalid answers re-ask; end of input is an error so a closed stdin can't
/// spin forever.
pub struct Prompter<R, W> {
    input: R,
    output: W,
}

impl Prompter<io::StdinLock<'static>, io::Stdout> {
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> Prompter<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    fn ask(&mut self, question: &str) -> io::Result<String> {
        writeln!(self.output, "{question}")?;
        self.output.flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "no more input"));
        }
        Ok(line.trim().to_string())
    }

    fn say(&mut self, message: &str) -> io::Result<()> {
        writeln!(self.output, "{message}")
    }

    /// Ask a Y/N question.
    pub fn confirm(&mut self, question: &str) -> io::Result<bool> {
        let question = format!("{question} (Y/N)");
        loop {
            match self.ask(&question)?.to_uppercase().as_str() {
                "Y" => return Ok(true),
                "N" => return Ok(false),
                _ => self.say("Invalid response.")?,
            }
        }
    }

    pub fn selection(&mut self) -> io::Result<Selection> {
        loop {
            match self
                .ask("Enter R for a range of dates, or A for all captures.")?
                .to_uppercase()
                .as_str()
            {
                "R" => return Ok(Selection::Range),
                "A" => return Ok(Selection::All),
                _ => self.say("Invalid input.")?,
            }
        }
    }

    /// Ask for start and end days until they select something valid.
    pub fn date_range(&mut self, captures: &[SnapshotId]) -> io::Result<Vec<SnapshotId>> {
        loop {
            let start = self.ask("Enter the start date in the format YYYYMMDD:")?;
            let end = self.ask("Enter the end date in the format YYYYMMDD:")?;

            match DateRange::from_days(&start, &end).and_then(|range| range.select(captures)) {
                Ok(selected) => return Ok(selected),
                Err(e) => self.say(&format!("{e}."))?,
            }
        }
    }
}
