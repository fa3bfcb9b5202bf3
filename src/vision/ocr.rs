//! OCR backends.
//!
//! Backends are a ranked list probed once at startup; a missing backend is a
//! configuration condition, not a per-call branch. Both shipped backends
//! drive the Tesseract CLI with TSV output, differing in page segmentation:
//! the primary assumes a uniform text block, the secondary runs sparse-text
//! mode, which picks up isolated UI labels the primary merges or drops.

use std::path::PathBuf;
use std::process::Command;

use anyhow::{Result, anyhow};
use image::GrayImage;
use tempfile::NamedTempFile;

/// One recognized text span, in frame-local pixel coordinates.
#[derive(Clone, Debug)]
pub struct OcrDetection {
    pub text: String,
    /// Recognition confidence in [0, 1].
    pub confidence: f32,
    pub center: (i32, i32),
}

pub trait TextBackend {
    fn name(&self) -> &'static str;
    fn recognize(&self, frame: &GrayImage) -> Result<Vec<OcrDetection>>;
}

const TESSDATA_REPO: &str = "https://github.com/tesseract-ocr/tessdata/raw/main";

/// Page segmentation: single uniform block of text.
const PSM_BLOCK: u8 = 6;
/// Page segmentation: sparse text, find as much as possible in no order.
const PSM_SPARSE: u8 = 11;

/// Returns the local directory for Tesseract language data.
pub fn data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("paradox-macro")
        .join("tessdata")
}

/// Ensures `eng.traineddata` is available locally, downloading it on first
/// run. Failure here degrades text recognition but never blocks startup.
pub fn ensure_language_data() -> Result<PathBuf> {
    let tessdata = data_dir();
    let traineddata = tessdata.join("eng.traineddata");
    if traineddata.exists() {
        return Ok(tessdata);
    }

    std::fs::create_dir_all(&tessdata)?;
    log::info!("Downloading eng.traineddata...");

    let client = reqwest::blocking::Client::builder()
        .timeout(std::time::Duration::from_secs(300))
        .build()?;
    let response = client
        .get(format!("{}/eng.traineddata", TESSDATA_REPO))
        .header("User-Agent", "paradox-macro")
        .send()?;
    if !response.status().is_success() {
        return Err(anyhow!("traineddata download failed: HTTP {}", response.status()));
    }

    let bytes = response.bytes()?;
    std::fs::write(&traineddata, &bytes)?;
    log::info!("Downloaded eng.traineddata ({} bytes)", bytes.len());
    Ok(tessdata)
}

fn find_executable() -> Option<PathBuf> {
    // PATH first.
    if let Ok(output) = Command::new("tesseract").arg("--version").output() {
        if output.status.success() {
            return Some(PathBuf::from("tesseract"));
        }
    }

    // Common install locations.
    let candidates = [
        r"C:\Program Files\Tesseract-OCR\tesseract.exe",
        r"C:\Program Files (x86)\Tesseract-OCR\tesseract.exe",
        "/usr/bin/tesseract",
        "/usr/local/bin/tesseract",
        "/opt/homebrew/bin/tesseract",
    ];
    candidates.iter().map(PathBuf::from).find(|p| p.exists())
}

fn find_tessdata() -> Option<PathBuf> {
    let local = data_dir();
    if local.join("eng.traineddata").exists() {
        return Some(local);
    }

    let system = [
        r"C:\Program Files\Tesseract-OCR\tessdata",
        r"C:\Program Files (x86)\Tesseract-OCR\tessdata",
        "/usr/share/tesseract-ocr/5/tessdata",
        "/usr/share/tessdata",
    ];
    for path in system {
        let p = PathBuf::from(path);
        if p.join("eng.traineddata").exists() {
            return Some(p);
        }
    }

    if let Ok(prefix) = std::env::var("TESSDATA_PREFIX") {
        let p = PathBuf::from(&prefix);
        if p.join("eng.traineddata").exists() {
            return Some(p);
        }
    }
    None
}

pub struct TesseractBackend {
    executable: PathBuf,
    tessdata: Option<PathBuf>,
    psm: u8,
    name: &'static str,
}

impl TesseractBackend {
    fn probe_with(psm: u8, name: &'static str) -> Option<Self> {
        let executable = find_executable()?;
        Some(Self { executable, tessdata: find_tessdata(), psm, name })
    }
}

impl TextBackend for TesseractBackend {
    fn name(&self) -> &'static str {
        self.name
    }

    fn recognize(&self, frame: &GrayImage) -> Result<Vec<OcrDetection>> {
        let input = NamedTempFile::with_suffix(".png")?;
        frame.save(input.path())?;

        let output_base = NamedTempFile::new()?;
        let base = output_base.path().to_string_lossy().to_string();

        let mut command = Command::new(&self.executable);
        command.arg(input.path()).arg(&base);
        if let Some(tessdata) = &self.tessdata {
            command.arg("--tessdata-dir").arg(tessdata);
        }
        command
            .arg("-l")
            .arg("eng")
            .arg("--psm")
            .arg(self.psm.to_string())
            .arg("tsv");

        let output = command.output()?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("tesseract failed: {}", stderr));
        }

        let tsv_path = format!("{}.tsv", base);
        let tsv = std::fs::read_to_string(&tsv_path)?;
        let _ = std::fs::remove_file(&tsv_path);

        Ok(parse_tsv(&tsv))
    }
}

/// Builds the ranked backend list from whatever is installed.
pub fn available_backends() -> Vec<Box<dyn TextBackend>> {
    let mut backends: Vec<Box<dyn TextBackend>> = Vec::new();
    if let Some(primary) = TesseractBackend::probe_with(PSM_BLOCK, "tesseract") {
        backends.push(Box::new(primary));
    }
    if let Some(sparse) = TesseractBackend::probe_with(PSM_SPARSE, "tesseract-sparse") {
        backends.push(Box::new(sparse));
    }
    backends
}

/// Parses Tesseract TSV output into line-level detections.
///
/// TSV fields: level, page_num, block_num, par_num, line_num, word_num,
/// left, top, width, height, conf, text. Level 5 rows are words; words are
/// regrouped into lines with an averaged confidence and a union bounding box.
fn parse_tsv(tsv: &str) -> Vec<OcrDetection> {
    struct LineAcc {
        key: (i32, i32, i32),
        words: Vec<String>,
        conf_sum: f32,
        min_x: i32,
        min_y: i32,
        max_x: i32,
        max_y: i32,
    }

    let mut detections = Vec::new();
    let mut current: Option<LineAcc> = None;

    let mut flush = |acc: Option<LineAcc>, out: &mut Vec<OcrDetection>| {
        if let Some(acc) = acc {
            if !acc.words.is_empty() {
                out.push(OcrDetection {
                    text: acc.words.join(" "),
                    confidence: (acc.conf_sum / acc.words.len() as f32 / 100.0).clamp(0.0, 1.0),
                    center: ((acc.min_x + acc.max_x) / 2, (acc.min_y + acc.max_y) / 2),
                });
            }
        }
    };

    for row in tsv.lines().skip(1) {
        let fields: Vec<&str> = row.split('\t').collect();
        if fields.len() < 12 {
            continue;
        }

        let level: i32 = fields[0].parse().unwrap_or(-1);
        if level != 5 {
            continue;
        }
        let text = fields[11].trim();
        let conf: f32 = fields[10].parse().unwrap_or(-1.0);
        if text.is_empty() || conf < 0.0 {
            continue;
        }

        let key = (
            fields[2].parse().unwrap_or(-1),
            fields[3].parse().unwrap_or(-1),
            fields[4].parse().unwrap_or(-1),
        );
        let left: i32 = fields[6].parse().unwrap_or(0);
        let top: i32 = fields[7].parse().unwrap_or(0);
        let width: i32 = fields[8].parse().unwrap_or(0);
        let height: i32 = fields[9].parse().unwrap_or(0);

        if current.as_ref().is_some_and(|acc| acc.key != key) {
            flush(current.take(), &mut detections);
        }

        let acc = current.get_or_insert_with(|| LineAcc {
            key,
            words: Vec::new(),
            conf_sum: 0.0,
            min_x: i32::MAX,
            min_y: i32::MAX,
            max_x: i32::MIN,
            max_y: i32::MIN,
        });
        acc.words.push(text.to_string());
        acc.conf_sum += conf;
        acc.min_x = acc.min_x.min(left);
        acc.min_y = acc.min_y.min(top);
        acc.max_x = acc.max_x.max(left + width);
        acc.max_y = acc.max_y.max(top + height);
    }
    flush(current, &mut detections);

    detections
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_TSV: &str = "level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext\n\
        1\t1\t0\t0\t0\t0\t0\t0\t640\t480\t-1\t\n\
        5\t1\t1\t1\t1\t1\t100\t50\t60\t20\t91.5\tCreate\n\
        5\t1\t1\t1\t1\t2\t170\t50\t50\t20\t88.5\tMatch\n\
        5\t1\t1\t1\t2\t1\t100\t90\t80\t20\t75.0\tVictory\n\
        5\t1\t1\t1\t2\t2\t190\t90\t10\t20\t-1\t \n";

    #[test]
    fn tsv_words_regroup_into_lines() {
        let detections = parse_tsv(SAMPLE_TSV);
        assert_eq!(detections.len(), 2);

        assert_eq!(detections[0].text, "Create Match");
        assert!((detections[0].confidence - 0.90).abs() < 0.001);
        assert_eq!(detections[0].center, ((100 + 220) / 2, (50 + 70) / 2));

        assert_eq!(detections[1].text, "Victory");
        assert!((detections[1].confidence - 0.75).abs() < 0.001);
    }

    #[test]
    fn malformed_rows_are_skipped() {
        let detections = parse_tsv("level\tbad\nnot-a-row\n5\t1\t1\n");
        assert!(detections.is_empty());
    }

    #[test]
    fn empty_tsv_yields_no_detections() {
        assert!(parse_tsv("").is_empty());
    }
}
