use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use crate::app::adb::runner::{CommandOutput, CommandRunner};
use crate::app::error::AppError;

struct Rule {
    needle: String,
    responses: VecDeque<Result<CommandOutput, AppError>>,
}

/// Scripted runner: the first rule whose needle occurs in the joined args answers.
/// A rule replays its responses in order and then repeats the last one.
pub struct FakeRunner {
    rules: Mutex<Vec<Rule>>,
    calls: Mutex<Vec<String>>,
    timeouts: Mutex<Vec<(String, Duration)>>,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self {
            rules: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
            timeouts: Mutex::new(Vec::new()),
        }
    }

    pub fn on(self, needle: &str, stdout: &str) -> Self {
        self.on_output(needle, CommandOutput::completed(stdout, "", Some(0)))
    }

    pub fn on_output(self, needle: &str, output: CommandOutput) -> Self {
        self.on_sequence(needle, vec![output])
    }

    pub fn on_sequence(self, needle: &str, outputs: Vec<CommandOutput>) -> Self {
        self.push(needle, outputs.into_iter().map(Ok).collect())
    }

    pub fn on_error(self, needle: &str, err: AppError) -> Self {
        self.push(needle, VecDeque::from(vec![Err(err)]))
    }

    fn push(self, needle: &str, responses: VecDeque<Result<CommandOutput, AppError>>) -> Self {
        self.rules.lock().expect("rules").push(Rule {
            needle: needle.to_string(),
            responses,
        });
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("calls").clone()
    }

    pub fn count(&self, needle: &str) -> usize {
        self.calls()
            .iter()
            .filter(|call| call.contains(needle))
            .count()
    }

    /// Timeouts passed with each call matching `needle`, in call order.
    pub fn timeouts(&self, needle: &str) -> Vec<Duration> {
        self.timeouts
            .lock()
            .expect("timeouts")
            .iter()
            .filter(|(call, _)| call.contains(needle))
            .map(|(_, timeout)| *timeout)
            .collect()
    }
}

pub fn failed(stderr: &str) -> CommandOutput {
    CommandOutput::completed("", stderr, Some(1))
}

impl CommandRunner for FakeRunner {
    fn run(
        &self,
        _program: &str,
        args: &[String],
        timeout: Duration,
        _trace_id: &str,
    ) -> Result<CommandOutput, AppError> {
        let joined = args.join(" ");
        self.calls.lock().expect("calls").push(joined.clone());
        self.timeouts
            .lock()
            .expect("timeouts")
            .push((joined.clone(), timeout));
        let mut rules = self.rules.lock().expect("rules");
        let Some(rule) = rules.iter_mut().find(|rule| joined.contains(&rule.needle)) else {
            return Ok(failed("not scripted"));
        };
        if rule.responses.len() > 1 {
            if let Some(next) = rule.responses.pop_front() {
                return next;
            }
        }
        rule.responses
            .front()
            .cloned()
            .unwrap_or_else(|| Ok(failed("not scripted")))
    }
}
