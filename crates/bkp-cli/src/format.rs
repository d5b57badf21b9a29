//! Renders engine events for the terminal. The engine itself never prints.

use bkp_engine::{Event, EventSink};

#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleSink;

impl EventSink for ConsoleSink {
    fn emit(&self, event: Event) {
        match event {
            Event::CreatedArchive { path, git, note } => {
                let mut line = format!("Created archive: {}", path.display());
                if let Some((branch, hash)) = git {
                    line.push_str(&format!(" [{branch}@{hash}]"));
                }
                if let Some(note) = note {
                    line.push_str(&format!(" ({note})"));
                }
                println!("{line}");
            }
            Event::CreatedIncrementalArchive { path, base } => {
                println!("Created incremental archive: {} (base: {base})", path.display());
            }
            Event::IdenticalArchive { existing } => {
                println!(
                    "Directory is identical to the most recent archive: {}",
                    existing.display()
                );
            }
            Event::CreatedBackup { path } => {
                println!("Created backup: {}", path.display());
            }
            Event::IdenticalBackup { existing } => {
                println!(
                    "File is identical to the existing backup: {}",
                    existing.display()
                );
            }
            Event::DryRunList { files, target } => {
                println!("Would create: {}", target.display());
                for file in files {
                    println!("  {file}");
                }
            }
            Event::NoFilesModified => {
                println!("No files modified since the last full archive");
            }
            Event::Verified { archive } => {
                println!("Verified: {}", archive.display());
            }
            Event::VerificationFailed { archive, errors } => {
                eprintln!("Verification failed: {}", archive.display());
                for error in errors {
                    eprintln!("  {error}");
                }
            }
            Event::ListArchives { archives } => {
                for archive in archives {
                    let kind = if archive.is_incremental { "inc " } else { "full" };
                    let verified = match &archive.verification {
                        Some(v) if v.is_verified => "verified",
                        Some(_) => "FAILED",
                        None => "-",
                    };
                    println!("{kind}  {:>8}  {}", verified, archive.name);
                }
            }
            Event::Error { message, .. } => {
                eprintln!("error: {message}");
            }
        }
    }
}
