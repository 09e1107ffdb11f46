use std::io::Cursor;

use anyhow::{Context, Result};
use genmedia_contracts::models::VideoModel;
use genmedia_contracts::request::{InputImage, Resolution};
use image::{ImageFormat, Rgb, RgbImage};
use serde_json::json;
use sha2::{Digest, Sha256};

use crate::{map_object, ClientOutput, MediaClient};

const DRYRUN_SIZE: u32 = 256;

/// Smallest well-formed MP4 prefix: a single `ftyp` box.
const MP4_FTYP: [u8; 24] = [
    0x00, 0x00, 0x00, 0x18, b'f', b't', b'y', b'p', b'i', b's', b'o', b'm', 0x00, 0x00, 0x02,
    0x00, b'i', b's', b'o', b'm', b'm', b'p', b'4', b'1',
];

/// Offline client. Images are solid squares coloured by the prompt hash.
#[derive(Debug, Clone, Copy, Default)]
pub struct DryrunClient;

impl DryrunClient {
    fn prompt_color(prompt: &str) -> Rgb<u8> {
        let digest = Sha256::digest(prompt.as_bytes());
        Rgb([digest[0], digest[1], digest[2]])
    }

    fn render_png(prompt: &str) -> Result<Vec<u8>> {
        let image = RgbImage::from_pixel(DRYRUN_SIZE, DRYRUN_SIZE, Self::prompt_color(prompt));
        let mut bytes = Cursor::new(Vec::new());
        image
            .write_to(&mut bytes, ImageFormat::Png)
            .context("failed to encode dryrun PNG")?;
        Ok(bytes.into_inner())
    }
}

impl MediaClient for DryrunClient {
    fn name(&self) -> &str {
        "dryrun"
    }

    fn generate_image(
        &self,
        prompt: &str,
        resolution: Resolution,
        input: Option<&InputImage>,
    ) -> Result<ClientOutput> {
        let mut warnings = Vec::new();
        if resolution != Resolution::OneK {
            warnings.push(format!(
                "Dryrun renders {DRYRUN_SIZE}x{DRYRUN_SIZE} regardless of {resolution}."
            ));
        }
        Ok(ClientOutput {
            bytes: Self::render_png(prompt)?,
            mime_type: "image/png".to_string(),
            model: "dryrun-image".to_string(),
            provider_request: map_object(json!({
                "endpoint": "dryrun",
                "prompt": prompt,
                "resolution": resolution.as_str(),
                "input_image_bytes": input.map(|image| image.bytes.len()),
            })),
            provider_response: map_object(json!({ "status": "ok" })),
            warnings,
        })
    }

    fn generate_video(
        &self,
        prompt: &str,
        model: VideoModel,
        negative_prompt: Option<&str>,
        input: Option<&InputImage>,
    ) -> Result<ClientOutput> {
        Ok(ClientOutput {
            bytes: MP4_FTYP.to_vec(),
            mime_type: "video/mp4".to_string(),
            model: "dryrun-video".to_string(),
            provider_request: map_object(json!({
                "endpoint": "dryrun",
                "prompt": prompt,
                "model": model.id(),
                "negative_prompt": negative_prompt,
                "input_image_bytes": input.map(|image| image.bytes.len()),
            })),
            provider_response: map_object(json!({ "status": "ok" })),
            warnings: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use genmedia_contracts::models::VideoModel;
    use genmedia_contracts::request::Resolution;

    use super::DryrunClient;
    use crate::MediaClient;

    #[test]
    fn image_is_a_decodable_png_coloured_by_prompt() -> anyhow::Result<()> {
        let output = DryrunClient.generate_image("a red bicycle", Resolution::OneK, None)?;
        assert_eq!(output.mime_type, "image/png");
        assert!(output.warnings.is_empty());

        let decoded = image::load_from_memory(&output.bytes)?.to_rgb8();
        assert_eq!(decoded.dimensions(), (256, 256));
        assert_eq!(
            *decoded.get_pixel(10, 10),
            DryrunClient::prompt_color("a red bicycle")
        );

        let again = DryrunClient.generate_image("a red bicycle", Resolution::OneK, None)?;
        assert_eq!(again.bytes, output.bytes);
        Ok(())
    }

    #[test]
    fn larger_resolution_is_noted() -> anyhow::Result<()> {
        let output = DryrunClient.generate_image("boat", Resolution::FourK, None)?;
        assert_eq!(output.warnings, vec!["Dryrun renders 256x256 regardless of 4K.".to_string()]);
        Ok(())
    }

    #[test]
    fn video_is_an_mp4_header() -> anyhow::Result<()> {
        let output = DryrunClient.generate_video("waves", VideoModel::Fast, None, None)?;
        assert_eq!(output.mime_type, "video/mp4");
        assert_eq!(&output.bytes[4..8], b"ftyp");
        assert_eq!(output.provider_request["model"], "veo-3.0-fast-generate-001");
        Ok(())
    }
}
