//! Console command dispatcher.
//!
//! Parameter edits are applied to a scratch copy of the configuration and
//! validated as a whole before the host sees them, so a rejected `set` never
//! leaves a half-applied bundle behind. Course control (`step`, `run`,
//! `reset`) is delegated to the [`ConsoleHost`].

use core::fmt;

use crate::config::{ConfigError, CourseConfig};
use crate::control::CourseResult;

use super::catalog::{self, CommandSpec};
use super::grammar::{self, Command, SetCommand};
use super::params::{Param, ParamError, Value};
use super::status::CourseStatus;

/// Upper bound for a single `step` request.
pub const MAX_STEP_TICKS: u32 = 10_000;

/// What the executor needs from the program hosting a course.
pub trait ConsoleHost {
    fn config(&self) -> &CourseConfig;

    /// Installs an already validated configuration. The next `reset` uses it.
    fn install_config(&mut self, config: CourseConfig);

    fn status(&self) -> CourseStatus;

    /// Advances up to `ticks` ticks. Returns the result if the course ended.
    fn step(&mut self, ticks: u32) -> Option<CourseResult>;

    /// Runs until the course ends. Hosts may bound the run; `None` means it
    /// stopped with the course still under way.
    fn run(&mut self) -> Option<CourseResult>;

    /// Rebuilds the course from the installed configuration.
    fn reset(&mut self) -> Result<(), ConfigError>;
}

/// Resolved `help` topic.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HelpTopic {
    Commands,
    Command(&'static CommandSpec),
    Param(Param),
}

/// Command execution successes.
#[derive(Clone, Debug, PartialEq)]
pub enum CommandOutcome {
    Status(CourseStatus),
    /// `None` asks the caller to list every parameter.
    Show(Option<(Param, Value)>),
    Set { param: Param, value: Value },
    Stepped {
        requested: u32,
        ended: Option<CourseResult>,
    },
    Ran(Option<CourseResult>),
    Reset,
    Help(HelpTopic),
}

/// Errors surfaced while executing a command.
#[derive(Clone, Debug, PartialEq)]
pub enum CommandError<'a> {
    Parse(grammar::ParseError<'a>),
    Param(ParamError),
    /// The edit was well-formed but the resulting bundle is inconsistent.
    Rejected(ConfigError),
    UnknownTopic(&'a str),
    Unsupported(&'static str),
}

impl<'a> From<grammar::ParseError<'a>> for CommandError<'a> {
    fn from(error: grammar::ParseError<'a>) -> Self {
        Self::Parse(error)
    }
}

impl From<ParamError> for CommandError<'_> {
    fn from(error: ParamError) -> Self {
        Self::Param(error)
    }
}

impl From<ConfigError> for CommandError<'_> {
    fn from(error: ConfigError) -> Self {
        Self::Rejected(error)
    }
}

impl fmt::Display for CommandError<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandError::Parse(error) => error.fmt(f),
            CommandError::Param(error) => error.fmt(f),
            CommandError::Rejected(error) => write!(f, "rejected: {error}"),
            CommandError::UnknownTopic(topic) => write!(f, "no help for `{topic}`"),
            CommandError::Unsupported(what) => f.write_str(what),
        }
    }
}

/// Dispatches console commands into a [`ConsoleHost`].
pub struct ConsoleExecutor<H> {
    host: H,
}

impl<H> ConsoleExecutor<H> {
    pub const fn new(host: H) -> Self {
        Self { host }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn into_inner(self) -> H {
        self.host
    }
}

impl<H> ConsoleExecutor<H>
where
    H: ConsoleHost,
{
    /// Parses and executes one console line.
    pub fn execute<'a>(&mut self, line: &'a str) -> Result<CommandOutcome, CommandError<'a>> {
        let command = grammar::parse(line)?;
        self.dispatch(command)
    }

    fn dispatch<'a>(&mut self, command: Command<'a>) -> Result<CommandOutcome, CommandError<'a>> {
        match command {
            Command::Status => Ok(CommandOutcome::Status(self.host.status())),
            Command::Show(param) => Ok(CommandOutcome::Show(
                param.map(|param| (param, param.read(self.host.config()))),
            )),
            Command::Set(edit) => self.handle_set(edit),
            Command::Step(step) => {
                let requested = step.ticks.unwrap_or(1);
                if requested == 0 || requested > MAX_STEP_TICKS {
                    return Err(CommandError::Unsupported("step count must be 1-10000"));
                }
                let ended = self.host.step(requested);
                Ok(CommandOutcome::Stepped { requested, ended })
            }
            Command::Run => Ok(CommandOutcome::Ran(self.host.run())),
            Command::Reset => {
                self.host.reset()?;
                Ok(CommandOutcome::Reset)
            }
            Command::Help(help) => match help.topic {
                None => Ok(CommandOutcome::Help(HelpTopic::Commands)),
                Some(topic) => catalog::find(topic)
                    .map(HelpTopic::Command)
                    .or_else(|| Param::find(topic).map(HelpTopic::Param))
                    .map(CommandOutcome::Help)
                    .ok_or(CommandError::UnknownTopic(topic)),
            },
        }
    }

    fn handle_set<'a>(&mut self, edit: SetCommand) -> Result<CommandOutcome, CommandError<'a>> {
        let mut candidate = self.host.config().clone();
        edit.param.write(&mut candidate, edit.value)?;
        candidate.validate()?;
        let value = edit.param.read(&candidate);
        self.host.install_config(candidate);
        Ok(CommandOutcome::Set {
            param: edit.param,
            value,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::BaseState;
    use crate::orchestrator::{TaskCounters, TaskState};

    #[derive(Default)]
    struct FakeHost {
        config: CourseConfig,
        stepped: u32,
        resets: u32,
    }

    impl ConsoleHost for FakeHost {
        fn config(&self) -> &CourseConfig {
            &self.config
        }

        fn install_config(&mut self, config: CourseConfig) {
            self.config = config;
        }

        fn status(&self) -> CourseStatus {
            CourseStatus {
                tick: self.stepped,
                base: BaseState::Start,
                task: TaskState::AwaitFirstTarget,
                counters: TaskCounters::default(),
                result: None,
            }
        }

        fn step(&mut self, ticks: u32) -> Option<CourseResult> {
            self.stepped += ticks;
            None
        }

        fn run(&mut self) -> Option<CourseResult> {
            Some(CourseResult::Finished)
        }

        fn reset(&mut self) -> Result<(), ConfigError> {
            self.resets += 1;
            self.config.validate()
        }
    }

    fn executor() -> ConsoleExecutor<FakeHost> {
        ConsoleExecutor::new(FakeHost::default())
    }

    #[test]
    fn set_installs_validated_config() {
        let mut executor = executor();
        let outcome = executor.execute("set cup 7").expect("set succeeds");
        assert_eq!(
            outcome,
            CommandOutcome::Set {
                param: Param::Cup,
                value: Value::Integer(7),
            }
        );
        assert_eq!(executor.host().config.debounce.cup, 7);
    }

    #[test]
    fn inconsistent_edit_leaves_config_untouched() {
        let mut executor = executor();
        let error = executor.execute("set reject 5").expect_err("below detect");
        assert_eq!(error, CommandError::Rejected(ConfigError::RejectBelowDetect));
        assert_eq!(executor.host().config, CourseConfig::competition());
    }

    #[test]
    fn step_defaults_to_one_tick() {
        let mut executor = executor();
        executor.execute("step").expect("step");
        executor.execute("step 4").expect("step 4");
        assert_eq!(executor.host().stepped, 5);
        assert!(matches!(
            executor.execute("step 0"),
            Err(CommandError::Unsupported(_))
        ));
    }

    #[test]
    fn show_reads_current_value() {
        let mut executor = executor();
        assert_eq!(
            executor.execute("show secondary-cap").expect("show"),
            CommandOutcome::Show(Some((Param::SecondaryCap, Value::Integer(6))))
        );
    }

    #[test]
    fn help_resolves_commands_and_params() {
        let mut executor = executor();
        assert_eq!(
            executor.execute("help net").expect("help"),
            CommandOutcome::Help(HelpTopic::Param(Param::Net))
        );
        assert!(matches!(
            executor.execute("help step").expect("help"),
            CommandOutcome::Help(HelpTopic::Command(spec)) if spec.name == "step"
        ));
        assert_eq!(
            executor.execute("help nothing"),
            Err(CommandError::UnknownTopic("nothing"))
        );
    }

    #[test]
    fn reset_reaches_host() {
        let mut executor = executor();
        assert_eq!(executor.execute("reset"), Ok(CommandOutcome::Reset));
        assert_eq!(executor.host().resets, 1);
    }
}
