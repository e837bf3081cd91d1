//! Recognize command implementation.

use std::path::PathBuf;

use thiserror::Error;
use tracing::{debug, info};
use winocr_session::{ErrorCategory, Session, SessionOptions};

use crate::cli::RecognizeArgs;
use crate::output::Output;

/// Some images in a batch could not be recognized.
///
/// Each failure has already been reported; this only carries the exit status.
#[derive(Error, Debug)]
#[error("{failed} of {total} images could not be recognized")]
pub struct BatchFailed {
    pub failed: usize,
    pub total: usize,
}

pub fn run(options: SessionOptions, args: RecognizeArgs, output: &Output) -> anyhow::Result<()> {
    let images = expand_inputs(&args.images);
    let session = Session::open(options)?;
    let header = images.len() > 1;

    let mut failed = 0;
    for image in &images {
        let name = image.display().to_string();
        match session.recognize_detailed(image.as_path()) {
            Ok(recognition) => output.print_recognition(&name, &recognition, args.lines, header),
            Err(e) if e.category() == ErrorCategory::Input => {
                output.print_error(Some(&name), &e);
                failed += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }

    session.close()?;
    info!("Recognized {} of {} images", images.len() - failed, images.len());

    if failed > 0 {
        return Err(BatchFailed {
            failed,
            total: images.len(),
        }
        .into());
    }

    Ok(())
}

/// Expand `~` and glob patterns in the image arguments.
///
/// A pattern with no matches is kept as a literal path so that the missing
/// file is reported like any other.
pub fn expand_inputs(inputs: &[String]) -> Vec<PathBuf> {
    let mut images = Vec::new();

    for input in inputs {
        let expanded = shellexpand::tilde(input).into_owned();

        if !is_pattern(&expanded) {
            images.push(PathBuf::from(expanded));
            continue;
        }

        let mut matches: Vec<PathBuf> = match glob::glob(&expanded) {
            Ok(paths) => paths.filter_map(|p| p.ok()).collect(),
            Err(e) => {
                debug!("Not a valid pattern {:?}: {}", expanded, e);
                Vec::new()
            }
        };

        if matches.is_empty() {
            images.push(PathBuf::from(expanded));
        } else {
            matches.sort();
            images.append(&mut matches);
        }
    }

    images
}

fn is_pattern(input: &str) -> bool {
    input.contains(['*', '?', '['])
}
