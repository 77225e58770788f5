//! Operator decisions
//!
//! Everything that used to be an inline prompt goes through [`Operator`], so
//! sessions and attacks can be driven by a terminal, by a script in tests, or
//! run unattended.

use std::io::{self, BufRead, Write};

use crate::capture::Capture;
use crate::codec;

/// Verdict on a capture surfaced in interactive mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Review {
    /// Keep the capture
    Accept,
    /// Discard it and keep listening
    Reject,
    /// Stop the session
    Cancel,
}

pub trait Operator {
    fn review(&mut self, capture: &Capture) -> Review;

    /// Yes/no question. Anything but an explicit yes is a decline.
    fn confirm(&mut self, question: &str) -> bool;

    /// Free-text answer, `None` if the operator gave nothing
    fn ask(&mut self, question: &str) -> Option<String>;
}

/// Operator for runs nobody is watching: accepts captures, declines
/// everything else
#[derive(Debug, Default, Clone, Copy)]
pub struct Unattended;

impl Operator for Unattended {
    fn review(&mut self, _capture: &Capture) -> Review {
        Review::Accept
    }

    fn confirm(&mut self, _question: &str) -> bool {
        false
    }

    fn ask(&mut self, _question: &str) -> Option<String> {
        None
    }
}

/// Line-based operator on a terminal
pub struct TerminalOperator<R, W> {
    input: R,
    output: W,
}

impl TerminalOperator<io::StdinLock<'static>, io::Stdout> {
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> TerminalOperator<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    /// Print `prompt` and read one trimmed line, `None` on end of input
    fn prompt(&mut self, prompt: &str) -> Option<String> {
        // A broken terminal reads as end of input
        write!(self.output, "{} ", prompt).ok()?;
        self.output.flush().ok()?;

        let mut line = String::new();
        match self.input.read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(line.trim().to_string()),
        }
    }
}

impl<R: BufRead, W: Write> Operator for TerminalOperator<R, W> {
    fn review(&mut self, capture: &Capture) -> Review {
        let _ = writeln!(self.output, "SIGNAL STRENGTH: {}", capture.rssi());
        let _ = writeln!(self.output, "RF CAPTURE:\n{}", capture.payload());
        let escaped = codec::format_hex_with_escapes(capture.payload());
        if !escaped.is_empty() {
            let _ = writeln!(self.output, "{}", escaped);
        }
        if let Ok(bits) = codec::hex_to_bits_minimal(capture.payload()) {
            let bits: String = bits.iter().map(|&b| if b { '1' } else { '0' }).collect();
            let _ = writeln!(self.output, "BITS: {}", bits);
        }
        for fragment in codec::split_by_zero_run(capture.payload()) {
            let _ = writeln!(self.output, "  fragment: {}", fragment);
        }

        match self.prompt("Keep this payload? (y/n, q to quit)") {
            None => Review::Cancel,
            Some(answer) => match answer.to_ascii_lowercase().as_str() {
                "y" | "yes" => Review::Accept,
                "q" | "quit" => Review::Cancel,
                _ => Review::Reject,
            },
        }
    }

    fn confirm(&mut self, question: &str) -> bool {
        matches!(
            self.prompt(&format!("{} (y/n)", question))
                .map(|a| a.to_ascii_lowercase())
                .as_deref(),
            Some("y") | Some("yes")
        )
    }

    fn ask(&mut self, question: &str) -> Option<String> {
        self.prompt(question).filter(|answer| !answer.is_empty())
    }
}

#[cfg(test)]
pub mod scripted {
    use std::collections::VecDeque;

    use super::{Operator, Review};
    use crate::capture::Capture;

    /// Operator replaying canned answers; runs dry as Cancel / no / nothing
    #[derive(Debug, Default)]
    pub struct ScriptedOperator {
        pub reviews: VecDeque<Review>,
        pub confirms: VecDeque<bool>,
        pub answers: VecDeque<String>,
        pub questions: Vec<String>,
    }

    impl ScriptedOperator {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_reviews(mut self, reviews: impl IntoIterator<Item = Review>) -> Self {
            self.reviews.extend(reviews);
            self
        }

        pub fn with_confirms(mut self, confirms: impl IntoIterator<Item = bool>) -> Self {
            self.confirms.extend(confirms);
            self
        }

        pub fn with_answer(mut self, answer: &str) -> Self {
            self.answers.push_back(answer.to_string());
            self
        }
    }

    impl Operator for ScriptedOperator {
        fn review(&mut self, _capture: &Capture) -> Review {
            self.reviews.pop_front().unwrap_or(Review::Cancel)
        }

        fn confirm(&mut self, question: &str) -> bool {
            self.questions.push(question.to_string());
            self.confirms.pop_front().unwrap_or(false)
        }

        fn ask(&mut self, question: &str) -> Option<String> {
            self.questions.push(question.to_string());
            self.answers.pop_front()
        }
    }
}
