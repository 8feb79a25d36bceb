mod session;

use std::env;
use std::io::{self, BufRead, Write};
use std::process::ExitCode;

use session::{Session, TranscriptProfile};

fn main() -> ExitCode {
    let profile = match TranscriptProfile::from_args(env::args().skip(1)) {
        Ok(profile) => profile,
        Err(message) => {
            eprintln!("{message}");
            eprintln!("Usage: sme-emulator [--profile] [hwmode|dualmac|nss]");
            return ExitCode::from(2);
        }
    };

    match run(profile) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn run(profile: TranscriptProfile) -> io::Result<()> {
    let mut session = Session::new(profile)?;
    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut writer = stdout.lock();

    writeln!(
        writer,
        "SME host emulator ready. Type `help` for commands or `exit` to quit."
    )?;
    write!(writer, "> ")?;
    writer.flush()?;

    for line in stdin.lock().lines() {
        let line = line?;
        let trimmed = line.trim();

        if trimmed.eq_ignore_ascii_case("exit") || trimmed.eq_ignore_ascii_case("quit") {
            writeln!(writer, "Session closed.")?;
            return Ok(());
        }

        for response in session.handle_command(trimmed)? {
            writeln!(writer, "{response}")?;
        }
        write!(writer, "> ")?;
        writer.flush()?;
    }

    // EOF on stdin.
    writeln!(writer)?;
    Ok(())
}
