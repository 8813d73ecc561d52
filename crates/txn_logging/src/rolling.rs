//! Size-bounded log file with numbered generations.
//!
//! `<stem>.log` is the live file; older output moves to `<stem>.log.1`,
//! `<stem>.log.2`, ... up to the configured generation count.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// How many generations to keep and how large each may grow.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RotationPolicy {
    pub keep: usize,
    pub max_bytes: u64,
}

pub(crate) struct RollingLog {
    /// Index 0 is the live file, the last entry the oldest kept generation.
    generations: Vec<PathBuf>,
    max_bytes: u64,
    live: Option<File>,
    written: u64,
}

impl RollingLog {
    pub(crate) fn open(dir: &Path, stem: &str, policy: RotationPolicy) -> io::Result<Self> {
        fs::create_dir_all(dir)?;
        let stem = file_stem(stem);
        let generations = (0..policy.keep.max(1))
            .map(|n| match n {
                0 => dir.join(format!("{stem}.log")),
                n => dir.join(format!("{stem}.log.{n}")),
            })
            .collect();

        let mut log = Self {
            generations,
            max_bytes: policy.max_bytes,
            live: None,
            written: 0,
        };
        log.reopen()?;
        if log.written > log.max_bytes {
            log.roll()?;
        }
        Ok(log)
    }

    fn reopen(&mut self) -> io::Result<()> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.generations[0])?;
        self.written = file.metadata()?.len();
        self.live = Some(file);
        Ok(())
    }

    fn roll(&mut self) -> io::Result<()> {
        if let Some(mut file) = self.live.take() {
            let _ = file.flush();
        }

        // Drop the oldest generation, then move each one up a slot.
        let oldest = &self.generations[self.generations.len() - 1];
        remove_if_present(oldest)?;
        for pair in self.generations.windows(2).rev() {
            if pair[0].exists() {
                fs::rename(&pair[0], &pair[1])?;
            }
        }

        self.reopen()
    }
}

impl Write for RollingLog {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.written > 0 && self.written + buf.len() as u64 > self.max_bytes {
            self.roll()?;
        }
        let Some(file) = self.live.as_mut() else {
            return Err(io::Error::new(io::ErrorKind::Other, "log file unavailable"));
        };
        let n = file.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.live.as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }
}

fn remove_if_present(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

/// Reduce an app name to characters safe in a file name.
fn file_stem(name: &str) -> String {
    name.chars()
        .map(|ch| match ch {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' => ch,
            _ => '_',
        })
        .collect()
}
