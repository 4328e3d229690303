//! Interactive prompts shared across CLI commands.

use anyhow::Result;
use std::io::{self, BufRead, Write};

/// Ask a yes/no question on stderr. Anything but `y`/`yes` is a no.
pub fn confirm(question: &str) -> Result<bool> {
    eprint!("{question} [y/N] ");
    io::stderr().flush()?;

    let answer = read_answer(&mut io::stdin().lock())?;
    Ok(is_yes(&answer))
}

/// Ask for a free-form value on stderr.
pub fn prompt(question: &str) -> Result<String> {
    eprint!("{question} ");
    io::stderr().flush()?;

    read_answer(&mut io::stdin().lock())
}

fn read_answer(input: &mut impl BufRead) -> Result<String> {
    let mut line = String::new();
    input.read_line(&mut line)?;
    Ok(line.trim().to_string())
}

fn is_yes(answer: &str) -> bool {
    let answer = answer.to_lowercase();
    answer == "y" || answer == "yes"
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_is_yes() {
        assert!(is_yes("y"));
        assert!(is_yes("YES"));
        assert!(!is_yes(""));
        assert!(!is_yes("no"));
        assert!(!is_yes("yep"));
    }

    #[test]
    fn test_read_answer_trims() {
        let mut input = Cursor::new("  git@github.com:me/blog.git \n");
        assert_eq!(read_answer(&mut input).unwrap(), "git@github.com:me/blog.git");

        let mut empty = Cursor::new("");
        assert_eq!(read_answer(&mut empty).unwrap(), "");
    }
}
