//! Info command implementation.

use winocr_session::{Session, SessionOptions};

use crate::output::Output;

pub fn run(options: SessionOptions, output: &Output) -> anyhow::Result<()> {
    let language = options.language.clone();
    let (interpreter, handshake) = Session::probe(options)?;

    output.print_info(&interpreter, &handshake, &language);
    Ok(())
}
