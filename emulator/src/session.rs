use std::cell::Cell;
use std::fs::{self, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::rc::Rc;
use std::time::{Duration, Instant as HostInstant};

use course_core::config::{ConfigError, CourseConfig};
use course_core::console::catalog;
use course_core::console::{
    ALL_PARAMS, CommandError, CommandOutcome, ConsoleExecutor, ConsoleHost, CourseStatus,
    HelpTopic,
};
use course_core::control::{ControlLoop, CourseResult};
use course_core::telemetry::{EventId, TelemetryEvent};

use crate::track::{SimActuators, SimClock, SimSensors, Track};

/// Consecutive faulty ticks injected by the sensor-fault profile.
const FAULT_BURST_TICKS: u32 = 3;

/// Ticks a single `run` may take before the host gives up on the course.
const RUN_TICK_LIMIT: u32 = 50_000;

type SimLoop = ControlLoop<SimSensors, SimActuators, SimClock>;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TranscriptProfile {
    Nominal,
    SensorFault,
    Tuning,
}

impl TranscriptProfile {
    pub fn log_path(self) -> &'static str {
        match self {
            TranscriptProfile::Nominal => "transcripts/emulator-nominal.log",
            TranscriptProfile::SensorFault => "transcripts/emulator-sensor-fault.log",
            TranscriptProfile::Tuning => "transcripts/emulator-tuning.log",
        }
    }

    pub fn header(self) -> &'static str {
        match self {
            TranscriptProfile::Nominal => "Course Emulator nominal run transcript",
            TranscriptProfile::SensorFault => "Course Emulator sensor fault transcript",
            TranscriptProfile::Tuning => "Course Emulator tuning transcript",
        }
    }

    pub fn from_tag(tag: &str) -> Result<Self, String> {
        if tag.eq_ignore_ascii_case("nominal") {
            Ok(Self::Nominal)
        } else if tag.eq_ignore_ascii_case("sensor-fault") || tag.eq_ignore_ascii_case("fault") {
            Ok(Self::SensorFault)
        } else if tag.eq_ignore_ascii_case("tuning") {
            Ok(Self::Tuning)
        } else {
            Err(format!("Unknown transcript profile `{tag}`"))
        }
    }

    /// Track the simulated robot drives for this profile.
    pub fn track(self) -> Track {
        match self {
            TranscriptProfile::Nominal | TranscriptProfile::Tuning => Track::competition(),
            TranscriptProfile::SensorFault => Track::with_fault_burst(FAULT_BURST_TICKS),
        }
    }
}

/// How a reply line should be highlighted on an interactive terminal.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Tone {
    Plain,
    StateChange,
    Hardware,
    Error,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Reply {
    pub tone: Tone,
    pub text: String,
}

impl Reply {
    fn plain(text: impl Into<String>) -> Self {
        Self {
            tone: Tone::Plain,
            text: text.into(),
        }
    }

    fn error(text: impl Into<String>) -> Self {
        Self {
            tone: Tone::Error,
            text: text.into(),
        }
    }
}

/// Simulated course driven by console commands.
pub struct CourseHost {
    track: Track,
    config: CourseConfig,
    control: SimLoop,
    clock: SimClock,
    result: Option<CourseResult>,
    cursor: EventId,
}

impl CourseHost {
    pub fn new(track: Track, config: CourseConfig) -> Result<Self, ConfigError> {
        let (control, clock) = build_loop(&track, config.clone())?;
        Ok(Self {
            track,
            config,
            control,
            clock,
            result: None,
            cursor: 0,
        })
    }

    pub fn result(&self) -> Option<CourseResult> {
        self.result
    }

    pub fn sensor_reinitializations(&mut self) -> u32 {
        self.control.sensors_mut().reinitializations()
    }

    /// `true` when the robot has driven onto the last track segment.
    pub fn at_track_end(&self) -> bool {
        self.control.sensors().at_track_end()
    }

    /// Simulated time spent ticking and holding actuators.
    pub fn elapsed(&self) -> Duration {
        self.clock.elapsed()
    }

    /// Narrates telemetry and hardware activity since the previous call.
    fn drain(&mut self) -> Vec<Reply> {
        let mut replies = Vec::new();

        let telemetry = self.control.telemetry();
        if let Some(first) = telemetry.oldest_first().next()
            && first.id > self.cursor
        {
            replies.push(Reply::plain(format!(
                "  ({} earlier events dropped)",
                first.id - self.cursor
            )));
        }
        for record in telemetry.since(self.cursor) {
            let tone = match record.event {
                TelemetryEvent::BaseTransition { .. } | TelemetryEvent::TaskTransition { .. } => {
                    Tone::StateChange
                }
                TelemetryEvent::SensorFault(_)
                | TelemetryEvent::ShutdownFailed(_)
                | TelemetryEvent::CourseAborted(_) => Tone::Error,
                TelemetryEvent::ScriptCompleted(_) | TelemetryEvent::CourseFinished => Tone::Plain,
            };
            replies.push(Reply {
                tone,
                text: format!("  event {record}"),
            });
        }
        self.cursor = telemetry.next_id();

        for event in self.control.actuators_mut().drain() {
            replies.push(Reply {
                tone: Tone::Hardware,
                text: format!("  hw {event}"),
            });
        }
        replies
    }
}

impl ConsoleHost for CourseHost {
    fn config(&self) -> &CourseConfig {
        &self.config
    }

    fn install_config(&mut self, config: CourseConfig) {
        self.config = config;
    }

    fn status(&self) -> CourseStatus {
        CourseStatus::capture(&self.control, self.result)
    }

    fn step(&mut self, ticks: u32) -> Option<CourseResult> {
        if self.result.is_some() {
            return self.result;
        }
        self.result = self.control.step(ticks);
        self.result
    }

    fn run(&mut self) -> Option<CourseResult> {
        if self.result.is_some() {
            return self.result;
        }
        let mut timer = self.clock.clone();
        self.result = self.control.run_course_for(&mut timer, RUN_TICK_LIMIT);
        self.result
    }

    fn reset(&mut self) -> Result<(), ConfigError> {
        let (control, clock) = build_loop(&self.track, self.config.clone())?;
        self.control = control;
        self.clock = clock;
        self.result = None;
        self.cursor = 0;
        Ok(())
    }
}

fn build_loop(track: &Track, config: CourseConfig) -> Result<(SimLoop, SimClock), ConfigError> {
    let moving = Rc::new(Cell::new(true));
    let clock = SimClock::default();
    let control = ControlLoop::new(
        config,
        SimSensors::new(track.clone(), Rc::clone(&moving)),
        SimActuators::new(moving),
        clock.clone(),
    )?;
    Ok((control, clock))
}

pub struct Session {
    executor: ConsoleExecutor<CourseHost>,
    transcript: TranscriptLogger,
    started_at: HostInstant,
}

impl Session {
    /// Starts a session that records its transcript to the profile's log file.
    pub fn new(profile: TranscriptProfile) -> io::Result<Self> {
        let transcript = TranscriptLogger::create(profile)?;
        Self::with_transcript(profile, transcript)
    }

    /// Starts a session whose transcript is discarded.
    pub fn detached(profile: TranscriptProfile) -> io::Result<Self> {
        Self::with_transcript(profile, TranscriptLogger::discard())
    }

    fn with_transcript(profile: TranscriptProfile, transcript: TranscriptLogger) -> io::Result<Self> {
        let host = CourseHost::new(profile.track(), CourseConfig::competition())
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidInput, err.to_string()))?;
        Ok(Self {
            executor: ConsoleExecutor::new(host),
            transcript,
            started_at: HostInstant::now(),
        })
    }

    pub fn host(&self) -> &CourseHost {
        self.executor.host()
    }

    pub fn host_mut(&mut self) -> &mut CourseHost {
        self.executor.host_mut()
    }

    pub fn handle_command(&mut self, line: &str) -> io::Result<Vec<Reply>> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Ok(Vec::new());
        }

        let elapsed = self.started_at.elapsed();
        self.transcript
            .append_line(elapsed, TranscriptRole::Host, trimmed)?;

        let mut replies = match self.executor.execute(trimmed) {
            Ok(outcome) => self.describe(outcome),
            Err(err) => vec![describe_error(&err)],
        };
        replies.extend(self.executor.host_mut().drain());

        for reply in &replies {
            self.transcript
                .append_line(elapsed, TranscriptRole::Emulator, &reply.text)?;
        }
        Ok(replies)
    }

    fn describe(&self, outcome: CommandOutcome) -> Vec<Reply> {
        let host = self.executor.host();
        match outcome {
            CommandOutcome::Status(status) => vec![Reply::plain(format!("OK {status}"))],
            CommandOutcome::Show(Some((param, value))) => {
                vec![Reply::plain(format!("OK {param} = {value}"))]
            }
            CommandOutcome::Show(None) => {
                let mut replies = vec![Reply::plain(format!("OK parameters ({})", ALL_PARAMS.len()))];
                replies.extend(ALL_PARAMS.iter().map(|param| {
                    Reply::plain(format!("  {param} = {}", param.read(host.config())))
                }));
                replies
            }
            CommandOutcome::Set { param, value } => vec![Reply::plain(format!(
                "OK {param} = {value} (takes effect on reset)"
            ))],
            CommandOutcome::Stepped { requested, ended } => {
                let tick = host.status().tick;
                match ended {
                    Some(result) => vec![Reply::plain(format!(
                        "OK course {result} at tick {tick}"
                    ))],
                    None => vec![Reply::plain(format!("OK stepped {requested} tick(s), now at {tick}"))],
                }
            }
            CommandOutcome::Ran(Some(result)) => vec![Reply::plain(format!(
                "OK course {result} after {} ticks ({} simulated)",
                host.status().tick,
                format_duration_short(host.elapsed()),
            ))],
            CommandOutcome::Ran(None) => {
                let cause = if host.at_track_end() {
                    "track exhausted"
                } else {
                    "tick limit reached"
                };
                vec![Reply::error(format!(
                    "ERR run stopped at tick {} with the course unfinished ({cause})",
                    host.status().tick,
                ))]
            }
            CommandOutcome::Reset => vec![Reply::plain("OK course reset")],
            CommandOutcome::Help(topic) => describe_help(topic, host.config()),
        }
    }
}

fn describe_error(error: &CommandError<'_>) -> Reply {
    match error {
        CommandError::Parse(err) => Reply::error(format!("ERR syntax {err}")),
        CommandError::Param(err) => Reply::error(format!("ERR param {err}")),
        CommandError::Rejected(err) => Reply::error(format!("ERR config {err}")),
        CommandError::UnknownTopic(_) => Reply::error(format!("ERR help {error}")),
        CommandError::Unsupported(what) => Reply::error(format!("ERR unsupported {what}")),
    }
}

fn describe_help(topic: HelpTopic, config: &CourseConfig) -> Vec<Reply> {
    match topic {
        HelpTopic::Commands => catalog::commands()
            .iter()
            .map(|spec| Reply::plain(format!("{:<26}- {}", spec.usage, spec.summary)))
            .collect(),
        HelpTopic::Command(spec) => vec![Reply::plain(format!(
            "{:<26}- {}",
            spec.usage, spec.summary
        ))],
        HelpTopic::Param(param) => vec![Reply::plain(format!(
            "{param} ({}) - {} [current {}]",
            param.kind().expected(),
            param.summary(),
            param.read(config),
        ))],
    }
}

struct TranscriptLogger {
    writer: BufWriter<Box<dyn Write>>,
}

impl TranscriptLogger {
    fn create(profile: TranscriptProfile) -> io::Result<Self> {
        let path = Path::new(profile.log_path());
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        let mut logger = Self {
            writer: BufWriter::new(Box::new(file)),
        };

        logger.write_header(profile)?;
        Ok(logger)
    }

    fn discard() -> Self {
        Self {
            writer: BufWriter::new(Box::new(io::sink())),
        }
    }

    fn write_header(&mut self, profile: TranscriptProfile) -> io::Result<()> {
        writeln!(self.writer, "# {}", profile.header())?;
        writeln!(
            self.writer,
            "# Timestamps are milliseconds since session start"
        )?;
        writeln!(self.writer)?;
        self.writer.flush()
    }

    fn append_line(
        &mut self,
        elapsed: Duration,
        role: TranscriptRole,
        line: &str,
    ) -> io::Result<()> {
        writeln!(
            self.writer,
            "[+{:>6} ms] {} {}",
            elapsed.as_millis(),
            role.prefix(),
            line
        )?;
        self.writer.flush()
    }
}

enum TranscriptRole {
    Host,
    Emulator,
}

impl TranscriptRole {
    fn prefix(&self) -> &'static str {
        match self {
            TranscriptRole::Host => "HOST>",
            TranscriptRole::Emulator => "EMU <",
        }
    }
}

fn format_duration_short(duration: Duration) -> String {
    if duration.as_secs() == 0 {
        format!("{}ms", duration.as_millis())
    } else {
        format!("{:.3}s", duration.as_secs_f64())
    }
}
