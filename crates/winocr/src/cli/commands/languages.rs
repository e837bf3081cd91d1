//! Languages command implementation.

use winocr_session::{Session, SessionOptions};

use crate::output::Output;

pub fn run(options: SessionOptions, output: &Output) -> anyhow::Result<()> {
    let requested = options.language.clone();
    let (_, handshake) = Session::probe(options)?;

    output.print_languages(&handshake, &requested);
    Ok(())
}
