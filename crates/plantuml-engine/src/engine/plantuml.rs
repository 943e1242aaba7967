//! PlantUML jar driven in pipe mode
//!
//! Every call spawns `java -jar plantuml.jar` with the block on stdin:
//! `-syntax` to classify, `-pipe -t<format>` to export.

use std::io::{Cursor, Write};
use std::path::PathBuf;
use std::process::{Command, Output, Stdio};

use image::{DynamicImage, ImageFormat, Rgb, RgbImage, Rgba};
use tracing::{debug, warn};

use super::{Diagram, DiagramBlock, DiagramEngine, EngineError, ExportMode};

/// Location and sandboxing of the PlantUML installation
#[derive(Debug, Clone)]
pub struct PlantUmlConfig {
    /// Java executable
    pub java: PathBuf,
    /// Path to `plantuml.jar`
    pub jar: PathBuf,
    /// Value for `PLANTUML_SECURITY_PROFILE` in the child environment
    pub security_profile: String,
}

impl Default for PlantUmlConfig {
    fn default() -> Self {
        Self {
            java: PathBuf::from("java"),
            jar: PathBuf::from("plantuml.jar"),
            security_profile: "SANDBOX".to_string(),
        }
    }
}

/// [`DiagramEngine`] backed by the PlantUML command line
#[derive(Debug, Clone, Default)]
pub struct PlantUmlEngine {
    config: PlantUmlConfig,
}

impl PlantUmlEngine {
    pub fn new(config: PlantUmlConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PlantUmlConfig {
        &self.config
    }

    /// Run `-version` and return the first line of its output
    pub fn check(&self) -> Result<String, EngineError> {
        let output = self.run(&["-version"], "")?;
        if !output.status.success() {
            return Err(EngineError::Unavailable(first_line(&output.stderr)));
        }
        Ok(first_line(&output.stdout))
    }

    fn run(&self, args: &[&str], input: &str) -> Result<Output, EngineError> {
        debug!("Running PlantUML with {:?}", args);

        let mut child = Command::new(&self.config.java)
            .arg("-Djava.awt.headless=true")
            .arg("-jar")
            .arg(&self.config.jar)
            .args(args)
            .env("PLANTUML_SECURITY_PROFILE", &self.config.security_profile)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => EngineError::Unavailable(format!(
                    "cannot launch {}",
                    self.config.java.display()
                )),
                _ => EngineError::Io(e),
            })?;

        // Feed stdin from another thread so a large image on stdout cannot
        // block the child while we are still writing.
        let writer = child.stdin.take().map(|mut stdin| {
            let input = input.as_bytes().to_vec();
            std::thread::spawn(move || stdin.write_all(&input))
        });

        let output = child.wait_with_output()?;
        if let Some(writer) = writer {
            match writer.join() {
                // The child may exit before reading everything; its output says why
                Ok(Err(e)) if e.kind() != std::io::ErrorKind::BrokenPipe => {
                    return Err(EngineError::Io(e))
                }
                Ok(_) => {}
                Err(_) => return Err(EngineError::Failed("stdin writer panicked".to_string())),
            }
        }
        Ok(output)
    }
}

impl DiagramEngine for PlantUmlEngine {
    fn classify(&self, block: &DiagramBlock) -> Result<Diagram, EngineError> {
        let output = self.run(&["-syntax", "-charset", "UTF-8"], &block.source)?;
        if output.stdout.is_empty() {
            warn!("PlantUML -syntax produced no output");
            return Err(EngineError::Failed(first_line(&output.stderr)));
        }
        Ok(parse_syntax_report(&String::from_utf8_lossy(&output.stdout)))
    }

    fn export(&self, block: &DiagramBlock, mode: ExportMode) -> Result<Vec<u8>, EngineError> {
        if mode == ExportMode::Jpeg {
            let png = self.export(block, ExportMode::Png)?;
            return png_to_jpeg(&png);
        }

        let output = self.run(
            &["-pipe", "-charset", "UTF-8", type_flag(mode)],
            &block.source,
        )?;
        // An erroneous diagram still yields an error image with a non-zero exit
        if output.stdout.is_empty() {
            warn!(
                "PlantUML export produced no output, status {}",
                output.status
            );
            return Err(EngineError::Failed(first_line(&output.stderr)));
        }
        Ok(output.stdout)
    }
}

fn type_flag(mode: ExportMode) -> &'static str {
    match mode {
        ExportMode::Png | ExportMode::Jpeg => "-tpng",
        ExportMode::Svg => "-tsvg",
        ExportMode::Pdf => "-tpdf",
        ExportMode::Eps => "-teps",
        ExportMode::Txt => "-ttxt",
        ExportMode::Utxt => "-tutxt",
        ExportMode::Latex => "-tlatex",
    }
}

/// Parse `-syntax` output: `ERROR`, line number, message lines; or the diagram kind
fn parse_syntax_report(report: &str) -> Diagram {
    let mut lines = report.lines().map(str::trim).filter(|l| !l.is_empty());
    match lines.next() {
        Some("ERROR") => {
            let line = lines.next().and_then(|l| l.parse().ok());
            let message = lines.collect::<Vec<_>>().join("; ");
            Diagram::Error {
                line,
                message: if message.is_empty() {
                    "Syntax Error".to_string()
                } else {
                    message
                },
            }
        }
        Some(kind) => Diagram::Renderable {
            kind: kind.to_string(),
        },
        None => Diagram::Error {
            line: None,
            message: "Empty syntax report".to_string(),
        },
    }
}

/// PlantUML has no JPEG writer; re-encode its PNG flattened over white
fn png_to_jpeg(png: &[u8]) -> Result<Vec<u8>, EngineError> {
    let rgba = image::load_from_memory_with_format(png, ImageFormat::Png)?.to_rgba8();
    let rgb = RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let Rgba([r, g, b, a]) = *rgba.get_pixel(x, y);
        Rgb([over_white(r, a), over_white(g, a), over_white(b, a)])
    });
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(rgb).write_to(&mut out, ImageFormat::Jpeg)?;
    Ok(out.into_inner())
}

fn over_white(channel: u8, alpha: u8) -> u8 {
    let (channel, alpha) = (u16::from(channel), u16::from(alpha));
    ((channel * alpha + 255 * (255 - alpha) + 127) / 255) as u8
}

fn first_line(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .lines()
        .next()
        .unwrap_or("no output")
        .to_string()
}
