//! Interactive question/answer capture
//!
//! Prompts go to stderr so that `decrypt -o -` keeps stdout for the payload.

use std::io::{BufRead, Stderr, StdinLock, Write};

use anyhow::{bail, Context, Result};
use secrecy::{ExposeSecret, SecretString};

use msqh_core::config::AnswerInput;
use msqh_crypto::AnswerProvider;

pub struct Console<R, W> {
    input: R,
    output: W,
    mode: AnswerInput,
}

impl Console<StdinLock<'static>, Stderr> {
    pub fn stdio(mode: AnswerInput) -> Self {
        Self::new(std::io::stdin().lock(), std::io::stderr(), mode)
    }
}

impl<R: BufRead, W: Write> Console<R, W> {
    pub fn new(input: R, output: W, mode: AnswerInput) -> Self {
        Self {
            input,
            output,
            mode,
        }
    }

    pub fn say(&mut self, message: &str) -> Result<()> {
        writeln!(self.output, "{message}").context("writing prompt")
    }

    fn read_line(&mut self) -> Result<String> {
        let mut line = String::new();
        let read = self.input.read_line(&mut line).context("reading input")?;
        if read == 0 {
            bail!("unexpected end of input");
        }
        let trimmed = line.trim_end_matches(['\n', '\r']).len();
        line.truncate(trimmed);
        Ok(line)
    }

    /// Show `> ` and read one visible line.
    pub fn ask(&mut self) -> Result<String> {
        write!(self.output, "> ").context("writing prompt")?;
        self.output.flush().context("flushing prompt")?;
        self.read_line()
    }

    /// Read one answer, hidden unless visible input was requested.
    pub fn read_answer(&mut self) -> Result<SecretString> {
        match self.mode {
            AnswerInput::Hidden => rpassword::prompt_password("> ")
                .map(SecretString::from)
                .context("reading hidden answer"),
            AnswerInput::Visible => self.ask().map(SecretString::from),
        }
    }

    /// Yes/no question; only `y` or `Y` counts as yes.
    pub fn confirm(&mut self, question: &str) -> Result<bool> {
        self.say(question)?;
        let reply = self.ask()?;
        Ok(reply == "y" || reply == "Y")
    }
}

impl<R: BufRead, W: Write> AnswerProvider for Console<R, W> {
    fn answer(&mut self, _index: usize, question: &str) -> anyhow::Result<SecretString> {
        self.say(question)?;
        self.read_answer()
    }
}

/// Questions and their confirmed answers, captured at encryption time.
pub struct Questionnaire {
    pub questions: Vec<String>,
    pub answers: Vec<SecretString>,
}

/// Register questions until an empty line, then capture every answer twice.
///
/// When the second entry differs, a third decides: matching the first keeps
/// it, matching the second replaces it, anything else aborts.
pub fn register<R: BufRead, W: Write>(console: &mut Console<R, W>) -> Result<Questionnaire> {
    let mut questions = Vec::new();
    loop {
        console.say("Enter a question, or press Enter to finish.")?;
        let question = console.ask()?;
        if question.is_empty() {
            break;
        }
        questions.push(question);
    }
    if questions.is_empty() {
        bail!("at least one question is required");
    }

    console.say("Enter the answers.")?;
    let mut answers = Vec::with_capacity(questions.len());
    for question in &questions {
        console.say(question)?;
        answers.push(console.read_answer()?);
    }

    console.say("Enter each answer once more.")?;
    for (question, answer) in questions.iter().zip(answers.iter_mut()) {
        console.say(question)?;
        let second = console.read_answer()?;
        if second.expose_secret() == answer.expose_secret() {
            continue;
        }
        console.say("That differs from the first answer. Enter it again.")?;
        let third = console.read_answer()?;
        if third.expose_secret() == answer.expose_secret() {
            console.say("Matched.")?;
        } else if third.expose_secret() == second.expose_secret() {
            *answer = third;
            console.say("Answer updated.")?;
        } else {
            bail!("answers did not match; please start over");
        }
    }

    Ok(Questionnaire { questions, answers })
}

/// Ask how many correct answers unlock the file, re-asking until valid.
pub fn ask_threshold<R: BufRead, W: Write>(console: &mut Console<R, W>, n: u16) -> Result<u16> {
    console.say(&format!(
        "{n} questions registered. How many correct answers should unlock the file?"
    ))?;
    loop {
        let reply = console.ask()?;
        match reply.trim().parse::<u16>() {
            Ok(m) if (1..=n).contains(&m) => return Ok(m),
            _ => console.say(&format!("Enter a number between 1 and {n}."))?,
        }
    }
}
