use std::net::UdpSocket;

use image::RgbImage;
use rosc::{encoder, OscMessage, OscPacket, OscType};

use super::{RenderError, Renderer};
use crate::{DrawingContext, Shape};

/// The listener on the other end cannot parse an empty argument list, so
/// every message carries this one string.
const PLACEHOLDER_ARG: &str = "nonsense";

/// Address pattern for one rectangle: `rectangle/{name}/{x}/{y}/{w}/{h}/`.
pub fn rectangle_address(name: &str, x: f64, y: f64, width: f64, height: f64) -> String {
    format!("rectangle/{name}/{x}/{y}/{width}/{height}/")
}

/// Encode an OSC 1.0 message whose arguments are all strings.
pub fn encode_message(address: &str, args: &[&str]) -> Result<Vec<u8>, RenderError> {
    let packet = OscPacket::Message(OscMessage {
        addr: address.to_string(),
        args: args.iter().map(|a| OscType::String(a.to_string())).collect(),
    });
    encoder::encode(&packet).map_err(|e| RenderError::Osc(format!("{e:?}")))
}

/// Publishes rectangles as OSC messages over UDP.
#[derive(Debug)]
pub struct OscRenderer {
    target: String,
    socket: Option<UdpSocket>,
}

impl OscRenderer {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            socket: None,
        }
    }
}

impl Renderer for OscRenderer {
    fn setup(&mut self) -> Result<(), RenderError> {
        let socket = UdpSocket::bind("0.0.0.0:0")?;
        socket.connect(&self.target)?;
        log::info!("OSC renderer sending to {}", self.target);
        self.socket = Some(socket);
        Ok(())
    }

    fn render(&mut self, ctx: &DrawingContext, _image: &RgbImage) -> Result<(), RenderError> {
        let socket = self.socket.as_ref().ok_or(RenderError::NotSetUp)?;
        for shape in ctx.shapes() {
            if let Shape::Rectangle {
                name,
                center,
                width,
                height,
                ..
            } = shape
            {
                let address = rectangle_address(name, center.x, center.y, *width, *height);
                log::debug!("osc {address}");
                socket.send(&encode_message(&address, &[PLACEHOLDER_ARG])?)?;
            }
        }
        Ok(())
    }

    fn show_calibration_markers(&mut self) -> Result<(), RenderError> {
        Ok(())
    }
}
