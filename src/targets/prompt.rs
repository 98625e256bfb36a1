//! Interactive target entry.
//!
//! The operator points the telescope at each target by hand and names it; the
//! current angles are read from the instrument. Every entered aim is appended to
//! a setup file so the same run can later be started from that file.

use super::{setup_file, Aim, Target};
use crate::adapters::Connector;
use crate::error::SetupError;
use crate::geocom::{GeoCom, InclineProgram, PrismType, TargetType};
use crate::journal::Journal;
use crate::units::rad_to_gon;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, Lines};

fn choices(items: impl Iterator<Item = (i32, &'static str)>) -> String {
    let listed: Vec<String> = items.map(|(code, name)| format!("{code}: {name}")).collect();
    format!("{{{}}}", listed.join(", "))
}

fn input_closed() -> SetupError {
    SetupError::Io(std::io::Error::new(
        std::io::ErrorKind::UnexpectedEof,
        "input closed during target entry",
    ))
}

/// Line-oriented question/answer session.
pub struct Prompt<R, W> {
    lines: Lines<R>,
    output: W,
    journal: Arc<dyn Journal>,
}

impl<R, W> Prompt<R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    /// Creates a session reading answers from `input` and writing questions to `output`.
    pub fn new(input: R, output: W, journal: Arc<dyn Journal>) -> Self {
        Self {
            lines: input.lines(),
            output,
            journal,
        }
    }

    /// Consumes the session, returning the output sink.
    pub fn into_output(self) -> W {
        self.output
    }

    async fn ask(&mut self, question: &str) -> Result<Option<String>, SetupError> {
        self.output.write_all(question.as_bytes()).await?;
        self.output.write_all(b"\n").await?;
        self.output.flush().await?;
        Ok(self
            .lines
            .next_line()
            .await?
            .map(|line| line.trim().to_string()))
    }

    async fn ask_code<T>(&mut self, question: &str) -> Result<T, SetupError>
    where
        T: TryFrom<i64, Error = SetupError>,
    {
        loop {
            let answer = self.ask(question).await?.ok_or_else(input_closed)?;
            match answer.parse::<i64>() {
                Ok(code) => match T::try_from(code) {
                    Ok(value) => return Ok(value),
                    Err(_) => self.journal.warning("Number not in values"),
                },
                Err(_) => self
                    .journal
                    .warning("Wrong input, enter the number for the value here"),
            }
        }
    }

    /// Collects aims until the operator enters `exit` or switches to a setup file.
    ///
    /// Hand-entered aims are appended to `setup_log`.
    pub async fn collect_aims<C: Connector>(
        &mut self,
        geocom: &mut GeoCom<C>,
        setup_log: &Path,
    ) -> Result<Vec<Aim>, SetupError> {
        let mut aims = Vec::new();

        loop {
            let Some(name) = self
                .ask("Aim for target, enter aim name and confirm when ready or 'file' for entering setup file ('exit' for finished)")
                .await?
            else {
                break;
            };

            match name.as_str() {
                "exit" => break,
                "" => continue,
                "file" => {
                    let path = self
                        .ask("Input full path of file")
                        .await?
                        .ok_or_else(input_closed)?;
                    aims.extend(setup_file::read(&PathBuf::from(path))?);
                    self.journal.info("Finished reading setup file");
                    break;
                }
                _ => {}
            }
            if name.chars().any(char::is_whitespace) {
                self.journal
                    .warning("Aim names cannot contain spaces, enter another name");
                continue;
            }

            let reading = geocom
                .get_angle(InclineProgram::Automatic)
                .await
                .map_err(SetupError::AngleRead)?;
            if !reading.return_code.is_ok() {
                self.journal.warning(&format!(
                    "Angle response failed ({}), aim again",
                    reading.return_code
                ));
                continue;
            }
            let hz = rad_to_gon(reading.hz_angle_raw);
            let v = rad_to_gon(reading.v_angle_raw);
            self.journal
                .info(&format!("Set hz {hz:.4}g, set v {v:.4}g"));

            let target_type: TargetType = self
                .ask_code(&format!(
                    "Select Target from {}",
                    choices(TargetType::ALL.iter().map(|t| (t.code(), t.name())))
                ))
                .await?;
            self.journal
                .info(&format!("Target set to {}", target_type.code()));

            let target = match target_type {
                TargetType::WithReflector => {
                    let prism: PrismType = self
                        .ask_code(&format!(
                            "Select Prism from {}",
                            choices(PrismType::ALL.iter().map(|p| (p.code(), p.name())))
                        ))
                        .await?;
                    self.journal.info(&format!("Prism set to {}", prism.code()));
                    Target::Reflector(prism)
                }
                TargetType::Reflectorless => Target::Reflectorless,
            };

            let aim = Aim::new(name, hz, v, target);
            setup_file::append(setup_log, &aim)?;
            aims.push(aim);
        }

        Ok(aims)
    }

    /// Asks for the number of sets; an empty answer means unbounded.
    pub async fn ask_set_count(&mut self) -> Result<Option<u32>, SetupError> {
        loop {
            let answer = self
                .ask("Enter amount of sets to measure or press enter for infinite amount of sets")
                .await?
                .unwrap_or_default();
            if answer.is_empty() {
                return Ok(None);
            }
            match answer.parse::<u32>() {
                Ok(sets) if sets > 0 => return Ok(Some(sets)),
                _ => self
                    .journal
                    .warning("Wrong input, enter a positive number of sets"),
            }
        }
    }

    /// Asks for the interval between set starts in minutes; an empty answer means continuous.
    pub async fn ask_interval(&mut self) -> Result<Option<Duration>, SetupError> {
        loop {
            let answer = self
                .ask("Enter measurement interval in minutes or press enter for continuous measuring")
                .await?
                .unwrap_or_default();
            if answer.is_empty() {
                return Ok(None);
            }
            match answer.parse::<u64>() {
                Ok(minutes) if minutes > 0 => return Ok(Some(Duration::from_secs(minutes * 60))),
                _ => self
                    .journal
                    .warning("Wrong input, enter a positive number of minutes"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{MockConnector, MockReply, Transport};
    use crate::clock::ManualClock;
    use crate::journal::{Level, MemoryJournal};

    async fn geocom(connector: &MockConnector, journal: Arc<MemoryJournal>) -> GeoCom<MockConnector> {
        let mut transport = Transport::new(connector.clone(), journal.clone(), Arc::new(ManualClock::new()));
        transport.connect().await;
        GeoCom::new(transport, journal)
    }

    #[tokio::test]
    async fn hand_entered_aims_use_current_angles() {
        let dir = tempfile::tempdir().unwrap();
        let setup_log = dir.path().join("setup.txt");
        let connector = MockConnector::new();
        let journal = Arc::new(MemoryJournal::new());
        let mut geocom = geocom(&connector, journal.clone()).await;

        let input: &[u8] = b"P1\nx\n0\n42\n3\n\nWall\n1\nexit\n";
        let mut prompt = Prompt::new(input, Vec::new(), journal.clone());
        let aims = prompt.collect_aims(&mut geocom, &setup_log).await.unwrap();

        assert_eq!(aims.len(), 2);
        assert_eq!(aims[0].name, "P1");
        assert_eq!(aims[0].target, Target::Reflector(PrismType::Prism360));
        assert!((aims[0].hz - rad_to_gon(1.0001)).abs() < 1e-9);
        assert!((aims[0].v - rad_to_gon(1.5001)).abs() < 1e-9);
        assert_eq!(aims[1].target, Target::Reflectorless);

        assert!(journal.contains(Level::Warning, "Wrong input"));
        assert!(journal.contains(Level::Warning, "Number not in values"));
        assert_eq!(setup_file::read(&setup_log).unwrap(), aims);

        let transcript = String::from_utf8(prompt.into_output()).unwrap();
        assert!(transcript.contains("Select Target from {0: BAP_REFL_USE, 1: BAP_REFL_LESS}"));
    }

    #[tokio::test]
    async fn file_answer_reads_a_setup_file() {
        let dir = tempfile::tempdir().unwrap();
        let setup = dir.path().join("existing.txt");
        std::fs::write(&setup, "P1 1 100 1 -1\nP2 2 100 0 0\n").unwrap();
        let connector = MockConnector::new();
        let journal = Arc::new(MemoryJournal::new());
        let mut geocom = geocom(&connector, journal.clone()).await;

        let input = format!("file\n{}\n", setup.display());
        let mut prompt = Prompt::new(input.as_bytes(), Vec::new(), journal.clone());
        let aims = prompt
            .collect_aims(&mut geocom, &dir.path().join("unused.txt"))
            .await
            .unwrap();

        assert_eq!(aims.len(), 2);
        assert!(connector.commands().is_empty());
        assert!(journal.contains(Level::Info, "Finished reading setup file"));
    }

    #[tokio::test]
    async fn failed_angle_read_re_prompts() {
        let dir = tempfile::tempdir().unwrap();
        let connector = MockConnector::new();
        connector.script(2003, MockReply::angles(1283));
        let journal = Arc::new(MemoryJournal::new());
        let mut geocom = geocom(&connector, journal.clone()).await;

        let input: &[u8] = b"P1\nP1\n1\nexit\n";
        let mut prompt = Prompt::new(input, Vec::new(), journal.clone());
        let aims = prompt
            .collect_aims(&mut geocom, &dir.path().join("setup.txt"))
            .await
            .unwrap();

        assert_eq!(aims.len(), 1);
        assert!(journal.contains(Level::Warning, "Angle response failed (1283)"));
    }

    #[tokio::test]
    async fn names_with_spaces_are_refused() {
        let dir = tempfile::tempdir().unwrap();
        let setup_log = dir.path().join("setup.txt");
        let connector = MockConnector::new();
        let journal = Arc::new(MemoryJournal::new());
        let mut geocom = geocom(&connector, journal.clone()).await;

        let input: &[u8] = b"North Pillar\nNorth_Pillar\n1\nexit\n";
        let mut prompt = Prompt::new(input, Vec::new(), journal.clone());
        let aims = prompt.collect_aims(&mut geocom, &setup_log).await.unwrap();

        assert_eq!(aims.len(), 1);
        assert_eq!(aims[0].name, "North_Pillar");
        assert!(journal.contains(Level::Warning, "cannot contain spaces"));
        // only the accepted name was aimed at
        assert_eq!(connector.rpc_log(), vec![2003]);
        assert_eq!(setup_file::read(&setup_log).unwrap(), aims);
    }

    #[tokio::test]
    async fn schedule_questions() {
        let journal = Arc::new(MemoryJournal::new());
        let input: &[u8] = b"abc\n5\n\n";
        let mut prompt = Prompt::new(input, Vec::new(), journal);

        assert_eq!(prompt.ask_set_count().await.unwrap(), Some(5));
        assert_eq!(prompt.ask_interval().await.unwrap(), None);
    }

    #[tokio::test]
    async fn interval_in_minutes() {
        let journal = Arc::new(MemoryJournal::new());
        let input: &[u8] = b"0\n15\n";
        let mut prompt = Prompt::new(input, Vec::new(), journal);

        assert_eq!(
            prompt.ask_interval().await.unwrap(),
            Some(Duration::from_secs(15 * 60))
        );
    }
}
