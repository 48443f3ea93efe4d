// ============================================================================
// remask CLI — headless mask processing via command-line arguments
// ============================================================================
//
// Usage examples:
//   remask --image photo.png --mask mask.png --output mask_full.jpg
//   remask -i photo.jpg -m mask.png -o mask.png --format png
//   remask -i photo.png -m mask.png --endpoint https://api.example.com/v1/remove \
//          --image-url https://cdn.example.com/photo.png
//
// No GUI is opened in CLI mode. The mask is validated against the image's
// natural dimensions, re-encoded at full resolution, and optionally
// submitted to the removal endpoint.

use std::path::PathBuf;

use clap::Parser;

use crate::mask::{MaskBuffer, MaskFormat};
use crate::remote::RemovalClient;

/// remask headless mask processor.
///
/// Validate, re-encode, and submit object-removal masks without opening the
/// GUI.
#[derive(Parser, Debug)]
#[command(
    name = "remask",
    about = "remask headless mask processor",
    long_about = "Validate a painted mask against its source image, re-encode it at\n\
                  full image-natural resolution, and optionally submit the pair to an\n\
                  object-removal endpoint.\n\n\
                  Example:\n  \
                  remask --image photo.png --mask mask.png --output mask_full.jpg"
)]
pub struct CliArgs {
    /// Source image the mask was painted over.
    #[arg(short, long, value_name = "FILE")]
    pub image: PathBuf,

    /// Mask raster to process. Must match the image's natural dimensions.
    #[arg(short, long, value_name = "FILE")]
    pub mask: PathBuf,

    /// Where to write the re-encoded mask. Format inferred from the
    /// extension unless --format is given.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output encoding: png or jpeg.
    #[arg(long, value_name = "FORMAT")]
    pub format: Option<String>,

    /// JPEG quality (1-100).
    #[arg(long, default_value_t = 85)]
    pub quality: u8,

    /// Removal-service endpoint. When set, the image/mask pair is submitted.
    #[arg(long, value_name = "URL")]
    pub endpoint: Option<String>,

    /// Already-uploaded source-image URL the service should operate on.
    /// Required with --endpoint.
    #[arg(long, value_name = "URL")]
    pub image_url: Option<String>,
}

impl CliArgs {
    /// CLI mode is requested when an --image/-i flag appears anywhere on the
    /// command line; otherwise the GUI starts.
    pub fn is_cli_mode() -> bool {
        std::env::args().any(|a| a == "--image" || a == "-i")
    }
}

/// Run the headless pipeline. Returns a process exit code.
pub fn run(args: CliArgs) -> i32 {
    match run_inner(&args) {
        Ok(()) => 0,
        Err(msg) => {
            eprintln!("remask: {}", msg);
            1
        }
    }
}

fn run_inner(args: &CliArgs) -> Result<(), String> {
    let image = image::open(&args.image)
        .map_err(|e| format!("failed to open image {:?}: {}", args.image, e))?
        .to_rgba8();
    let mask_raster = image::open(&args.mask)
        .map_err(|e| format!("failed to open mask {:?}: {}", args.mask, e))?
        .to_rgba8();

    if (mask_raster.width(), mask_raster.height()) != (image.width(), image.height()) {
        return Err(format!(
            "mask is {}×{} but the image's natural size is {}×{} — masks must align 1:1",
            mask_raster.width(),
            mask_raster.height(),
            image.width(),
            image.height()
        ));
    }

    let mask = MaskBuffer::from_image(mask_raster)
        .ok_or("mask dimensions exceed the supported raster size")?;
    let format = resolve_format(args)?;
    let encoded = mask
        .export(format, args.quality.clamp(1, 100))
        .map_err(|e| e.to_string())?;

    if let Some(output) = &args.output {
        std::fs::write(output, &encoded)
            .map_err(|e| format!("failed to write {:?}: {}", output, e))?;
        println!(
            "wrote {} ({}×{}, {} bytes)",
            output.display(),
            mask.width(),
            mask.height(),
            encoded.len()
        );
    }

    if let Some(endpoint) = &args.endpoint {
        let image_url = args
            .image_url
            .as_deref()
            .ok_or("--endpoint requires --image-url")?;
        let client = RemovalClient::new(endpoint.clone());
        let ack = client
            .submit(image_url, &encoded, format.mime())
            .map_err(|e| {
                if e.is_retryable() {
                    format!("{} (retryable — mask unchanged, run again)", e)
                } else {
                    e.to_string()
                }
            })?;
        println!(
            "removal job accepted: event_id {}",
            ack.event_id.as_deref().unwrap_or("<none>")
        );
    }

    if args.output.is_none() && args.endpoint.is_none() {
        println!(
            "mask OK: {}×{} matches image, {:.2}% coverage",
            mask.width(),
            mask.height(),
            mask.coverage() * 100.0
        );
    }

    Ok(())
}

fn resolve_format(args: &CliArgs) -> Result<MaskFormat, String> {
    if let Some(fmt) = &args.format {
        return match fmt.to_lowercase().as_str() {
            "png" => Ok(MaskFormat::Png),
            "jpg" | "jpeg" => Ok(MaskFormat::Jpeg),
            other => Err(format!("unknown format {:?} (expected png or jpeg)", other)),
        };
    }
    if let Some(output) = &args.output {
        let ext = output
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        return match ext.as_str() {
            "png" => Ok(MaskFormat::Png),
            "jpg" | "jpeg" | "" => Ok(MaskFormat::Jpeg),
            other => Err(format!("unsupported output extension {:?}", other)),
        };
    }
    Ok(MaskFormat::Jpeg)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_args() -> CliArgs {
        CliArgs {
            image: PathBuf::from("photo.png"),
            mask: PathBuf::from("mask.png"),
            output: None,
            format: None,
            quality: 85,
            endpoint: None,
            image_url: None,
        }
    }

    #[test]
    fn format_flag_wins_over_extension() {
        let mut args = base_args();
        args.output = Some(PathBuf::from("out.png"));
        args.format = Some("jpeg".into());
        assert_eq!(resolve_format(&args).unwrap(), MaskFormat::Jpeg);
    }

    #[test]
    fn format_inferred_from_output_extension() {
        let mut args = base_args();
        args.output = Some(PathBuf::from("out.png"));
        assert_eq!(resolve_format(&args).unwrap(), MaskFormat::Png);

        args.output = Some(PathBuf::from("out.jpg"));
        assert_eq!(resolve_format(&args).unwrap(), MaskFormat::Jpeg);
    }

    #[test]
    fn unknown_format_is_rejected() {
        let mut args = base_args();
        args.format = Some("webp".into());
        assert!(resolve_format(&args).is_err());
    }

    #[test]
    fn default_format_is_jpeg() {
        assert_eq!(resolve_format(&base_args()).unwrap(), MaskFormat::Jpeg);
    }
}
