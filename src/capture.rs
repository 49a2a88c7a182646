//! The packet capture driver, built on `pcap` for link-layer capture and
//! `etherparse` for Ethernet/VLAN/IPv4/UDP dissection.

use etherparse::{SlicedPacket, TransportSlice};
use pcap::{Active, Capture, Device};
use thiserror::Error;

use crate::pipeline::PhotonPipeline;
use crate::protocol::command::parse_envelope;

/// BPF filter installed on the capture handle.
pub const BPF_FILTER: &str = "udp and (dst port 5056 or src port 5056)";

/// Snaplen used when opening the capture device.
pub const SNAPLEN: i32 = 65535;

/// UDP ports the Photon command parser is registered against.
const PHOTON_PORTS: [u16; 2] = [5055, 5056];

/// Errors opening or reading from a capture device. Setup failures are
/// fatal; failures reading one packet are not represented here since
/// [`run_capture_loop`] drops that packet and continues.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// No network device could be found automatically.
    #[error("no capture device available")]
    NoDevice,
    /// The interface named on the command line doesn't exist.
    #[error("capture device {0} not found")]
    DeviceNotFound(String),
    /// Any other libpcap failure.
    #[error("pcap error: {0}")]
    Pcap(#[from] pcap::Error),
}

/// Opens a capture handle on `interface` (or the default route's device if
/// `None`), in promiscuous mode with a 65535-byte snaplen and the Photon
/// BPF filter installed.
pub fn open_capture(interface: Option<&str>) -> Result<Capture<Active>, CaptureError> {
    let device = match interface {
        Some(name) => Device::list()?
            .into_iter()
            .find(|d| d.name == name)
            .ok_or_else(|| CaptureError::DeviceNotFound(name.to_string()))?,
        None => Device::lookup()?.ok_or(CaptureError::NoDevice)?,
    };

    log::debug!("opening capture device {}", device.name);

    let mut capture = Capture::from_device(device)?
        .promisc(true)
        .snaplen(SNAPLEN)
        .open()?;

    capture.filter(BPF_FILTER, true)?;

    Ok(capture)
}

/// Runs the blocking reader loop: reads packets until the capture handle is
/// closed or errors, dissecting each down to its UDP payload and handing
/// Photon datagrams to `pipeline`. Returns once the capture source is
/// exhausted (only possible when reading from a file rather than a live
/// device); a live capture runs until the process is interrupted.
pub fn run_capture_loop(
    capture: &mut Capture<Active>,
    pipeline: &mut PhotonPipeline,
) -> Result<(), CaptureError> {
    loop {
        match capture.next_packet() {
            Ok(packet) => handle_frame(packet.data, pipeline),
            Err(pcap::Error::TimeoutExpired) => continue,
            Err(pcap::Error::NoMorePackets) => return Ok(()),
            Err(e) => return Err(e.into()),
        }
    }
}

fn handle_frame(data: &[u8], pipeline: &mut PhotonPipeline) {
    let sliced = match SlicedPacket::from_ethernet(data) {
        Ok(sliced) => sliced,
        Err(e) => {
            log::debug!("failed to parse link layer: {:?}", e);
            return;
        }
    };

    let Some(TransportSlice::Udp(udp)) = sliced.transport else {
        return;
    };

    if !PHOTON_PORTS.contains(&udp.source_port()) && !PHOTON_PORTS.contains(&udp.destination_port())
    {
        return;
    }

    let payload = sliced.payload;
    match parse_envelope(payload) {
        Ok(envelope) => {
            for command in envelope.commands {
                pipeline.handle_command(command);
            }
        }
        Err(e) => log::warn!("malformed datagram: {} - {:02x?}", e, payload),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bpf_filter_matches_both_directions_of_the_game_port() {
        assert!(BPF_FILTER.contains("5056"));
        assert!(BPF_FILTER.contains("dst port") || BPF_FILTER.contains("src port"));
    }

    #[test]
    fn photon_ports_include_both_documented_ports() {
        assert!(PHOTON_PORTS.contains(&5055));
        assert!(PHOTON_PORTS.contains(&5056));
    }
}
