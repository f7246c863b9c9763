use std::io;

#[allow(dead_code)]
#[path = "../session.rs"]
mod session;
#[allow(dead_code)]
#[path = "../track.rs"]
mod track;

use session::{Session, TranscriptProfile};

fn main() -> io::Result<()> {
    record_profile(TranscriptProfile::Nominal)?;
    record_profile(TranscriptProfile::SensorFault)?;
    record_profile(TranscriptProfile::Tuning)?;
    Ok(())
}

fn record_profile(profile: TranscriptProfile) -> io::Result<()> {
    let mut session = Session::new(profile)?;
    match profile {
        TranscriptProfile::Nominal => record_nominal(&mut session),
        TranscriptProfile::SensorFault => record_sensor_fault(&mut session),
        TranscriptProfile::Tuning => record_tuning(&mut session),
    }
}

fn record_nominal(session: &mut Session) -> io::Result<()> {
    let _ = session.handle_command("status")?;
    let _ = session.handle_command("step 3")?;
    let _ = session.handle_command("run")?;
    let _ = session.handle_command("status")?;
    Ok(())
}

fn record_sensor_fault(session: &mut Session) -> io::Result<()> {
    let _ = session.handle_command("run")?;
    let _ = session.handle_command("set max-sensor-faults 2")?;
    let _ = session.handle_command("reset")?;
    let _ = session.handle_command("run")?;
    let _ = session.handle_command("status")?;
    Ok(())
}

fn record_tuning(session: &mut Session) -> io::Result<()> {
    let _ = session.handle_command("help")?;
    let _ = session.handle_command("help net")?;
    let _ = session.handle_command("show")?;
    let _ = session.handle_command("set reject 5")?;
    let _ = session.handle_command("set net = 5")?;
    let _ = session.handle_command("set grab 1200ms")?;
    let _ = session.handle_command("set tick 20ms")?;
    let _ = session.handle_command("reset")?;
    let _ = session.handle_command("run")?;
    Ok(())
}
