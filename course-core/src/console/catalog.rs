//! Command catalog shared by the parser and the `help` command.

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommandTag {
    Status,
    Show,
    Set,
    Step,
    Run,
    Reset,
    Help,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CommandSpec {
    pub name: &'static str,
    pub tag: CommandTag,
    pub usage: &'static str,
    pub summary: &'static str,
}

const COMMANDS: [CommandSpec; 7] = [
    CommandSpec {
        name: "status",
        tag: CommandTag::Status,
        usage: "status",
        summary: "print the base and task states plus progress counters",
    },
    CommandSpec {
        name: "show",
        tag: CommandTag::Show,
        usage: "show [param]",
        summary: "print one tunable parameter, or all of them",
    },
    CommandSpec {
        name: "set",
        tag: CommandTag::Set,
        usage: "set <param> [=] <value>",
        summary: "change a parameter; values are integers, decimals or durations (ms/s)",
    },
    CommandSpec {
        name: "step",
        tag: CommandTag::Step,
        usage: "step [ticks]",
        summary: "advance the course by one or more ticks",
    },
    CommandSpec {
        name: "run",
        tag: CommandTag::Run,
        usage: "run",
        summary: "run the course until it finishes or aborts",
    },
    CommandSpec {
        name: "reset",
        tag: CommandTag::Reset,
        usage: "reset",
        summary: "rebuild the course with the current parameters",
    },
    CommandSpec {
        name: "help",
        tag: CommandTag::Help,
        usage: "help [command|param]",
        summary: "describe a command or parameter",
    },
];

/// Returns the full command catalog.
#[must_use]
pub const fn commands() -> &'static [CommandSpec] {
    &COMMANDS
}

/// Looks up a command by its tag.
#[must_use]
pub fn command(tag: CommandTag) -> &'static CommandSpec {
    match tag {
        CommandTag::Status => &COMMANDS[0],
        CommandTag::Show => &COMMANDS[1],
        CommandTag::Set => &COMMANDS[2],
        CommandTag::Step => &COMMANDS[3],
        CommandTag::Run => &COMMANDS[4],
        CommandTag::Reset => &COMMANDS[5],
        CommandTag::Help => &COMMANDS[6],
    }
}

/// Finds a command by name (case insensitive).
#[must_use]
pub fn find(name: &str) -> Option<&'static CommandSpec> {
    COMMANDS
        .iter()
        .find(|command| command.name.eq_ignore_ascii_case(name))
}
