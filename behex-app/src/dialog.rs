use std::io::{self, BufRead, Write};

use behex_core::Result;
use behex_experiment::{Subject, SubjectInfo};

/// Console subject-info dialog: prompts on stdin, empty input keeps the
/// suggested default. End-of-input cancels, which the caller treats as
/// the quit signal.
pub struct PromptSubject;

impl SubjectInfo for PromptSubject {
    fn collect(&mut self, default: &Subject) -> Result<Option<Subject>> {
        let stdin = io::stdin();
        let mut line = String::new();

        print!("subject id [{}]: ", default.id);
        io::stdout().flush()?;
        if stdin.lock().read_line(&mut line)? == 0 {
            return Ok(None);
        }
        let mut subject = default.clone();
        let id = line.trim();
        if !id.is_empty() {
            subject.id = id.to_string();
        }

        line.clear();
        print!("age (optional): ");
        io::stdout().flush()?;
        if stdin.lock().read_line(&mut line)? == 0 {
            return Ok(None);
        }
        subject.age = line.trim().parse().ok();

        Ok(Some(subject))
    }
}
