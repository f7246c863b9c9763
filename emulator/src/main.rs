mod session;
mod track;

use std::env;
use std::io::{self, BufRead, Write};
use std::process;

use crossterm::style::Stylize;
use crossterm::tty::IsTty;
use session::{Reply, Session, Tone, TranscriptProfile};

const USAGE: &str = "usage: course-emulator [--profile <nominal|sensor-fault|tuning>]";

fn main() -> io::Result<()> {
    let profile = match profile_from_args(env::args().skip(1)) {
        Ok(profile) => profile,
        Err(err) => {
            eprintln!("{err}\n{USAGE}");
            process::exit(2);
        }
    };

    let stdout = io::stdout();
    let styled = stdout.is_tty();
    let mut out = stdout.lock();
    let mut session = Session::new(profile)?;

    writeln!(out, "course emulator, {profile:?} track")?;
    writeln!(out, "`help` lists console commands, `quit` leaves.")?;
    prompt(&mut out)?;

    for line in io::stdin().lock().lines() {
        let line = line?;
        let command = line.trim();
        match command {
            "" => {}
            "quit" | "exit" => return writeln!(out, "bye"),
            _ => {
                for reply in session.handle_command(command)? {
                    write_reply(&mut out, &reply, styled)?;
                }
            }
        }
        prompt(&mut out)?;
    }

    writeln!(out)
}

fn prompt<W: Write>(out: &mut W) -> io::Result<()> {
    write!(out, "course> ")?;
    out.flush()
}

fn write_reply<W: Write>(out: &mut W, reply: &Reply, styled: bool) -> io::Result<()> {
    let text = reply.text.as_str();
    if !styled {
        return writeln!(out, "{text}");
    }
    match reply.tone {
        Tone::Plain => writeln!(out, "{text}"),
        Tone::StateChange => writeln!(out, "{}", text.cyan()),
        Tone::Hardware => writeln!(out, "{}", text.dark_grey()),
        Tone::Error => writeln!(out, "{}", text.red()),
    }
}

/// Accepts `--profile <tag>`, `--profile=<tag>` or a bare tag. Defaults to the nominal track.
fn profile_from_args(mut args: impl Iterator<Item = String>) -> Result<TranscriptProfile, String> {
    let Some(first) = args.next() else {
        return Ok(TranscriptProfile::Nominal);
    };
    let tag = match first.strip_prefix("--profile") {
        Some("") => args
            .next()
            .ok_or_else(|| "missing value for --profile".to_string())?,
        Some(rest) => match rest.strip_prefix('=') {
            Some(value) => value.to_string(),
            None => return Err(format!("unknown option `{first}`")),
        },
        None => first,
    };
    TranscriptProfile::from_tag(&tag)
}
