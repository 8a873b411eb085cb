use crate::config::{LabelsConfig, Validatable};
use std::{
    fs::File,
    io::{self, BufRead},
    path::Path,
};

pub trait State: Send + Sync + 'static {
    fn new(labels_cfg: &LabelsConfig) -> Result<Self, String>
    where
        Self: Sized;
    fn get_labels(&self) -> &Vec<String>;

    fn label_for(&self, class_id: u32) -> Option<&str> {
        self.get_labels().get(class_id as usize).map(String::as_str)
    }
}

#[derive(Debug)]
pub struct ServiceState {
    emotion_labels: Vec<String>,
}

impl State for ServiceState {
    fn new(labels_cfg: &LabelsConfig) -> Result<ServiceState, String> {
        match load_emotion_labels(&labels_cfg.get_path()) {
            Ok(labels) => {
                tracing::info!("Loaded {} emotion labels", labels.len());
                Ok(ServiceState {
                    emotion_labels: labels,
                })
            }
            Err(e) => Err(format!("Failed to load labels: {}", e)),
        }
    }

    fn get_labels(&self) -> &Vec<String> {
        &self.emotion_labels
    }
}

pub fn load_emotion_labels(filepath: &Path) -> io::Result<Vec<String>> {
    let file = File::open(filepath)?;
    parse_emotion_labels(io::BufReader::new(file))
}

/// One label per line, in model output order. Blank lines are skipped.
pub fn parse_emotion_labels<R: BufRead>(reader: R) -> io::Result<Vec<String>> {
    let mut labels = Vec::new();

    for line_result in reader.lines() {
        let line = line_result?;
        let label = line.trim();
        if label.is_empty() {
            continue;
        }
        labels.push(label.to_string());
    }

    if labels.is_empty() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "Labels file contains no labels",
        ));
    }

    Ok(labels)
}
