/// Magic-Packet Transmitter - Wake-on-LAN over broadcast UDP
///
/// The payload is 6 bytes of 0xFF followed by the 6-byte hardware address
/// repeated 16 times, sent as one datagram to the limited broadcast address
/// on port 9. Fire-and-forget: success means the packet was handed to the
/// network stack, not that the target woke.
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use thiserror::Error;
use tokio::net::UdpSocket;
use tracing::info;

/// Total magic packet size: 6 x 0xFF + 16 x 6-byte MAC
pub const MAGIC_PACKET_LEN: usize = 102;

/// Wake-on-LAN discard port
pub const WOL_PORT: u16 = 9;

#[derive(Debug, Error)]
pub enum WakeError {
    /// The hardware address does not reduce to 12 hex characters
    #[error("invalid MAC address format")]
    InvalidAddress,
    #[error("failed to send magic packet: {0}")]
    Io(#[from] std::io::Error),
}

/// Strip separators and check the address reduces to 12 hex characters
pub fn is_well_formed(mac: &str) -> bool {
    let stripped = strip_separators(mac);
    stripped.len() == 12 && stripped.chars().all(|c| c.is_ascii_hexdigit())
}

fn strip_separators(mac: &str) -> String {
    mac.chars().filter(|c| *c != ':' && *c != '-').collect()
}

/// Build the 102-byte magic packet payload for a hardware address
pub fn build_payload(mac: &str) -> Result<[u8; MAGIC_PACKET_LEN], WakeError> {
    let stripped = strip_separators(mac);
    if stripped.len() != 12 {
        return Err(WakeError::InvalidAddress);
    }
    let mac_bytes = hex::decode(&stripped).map_err(|_| WakeError::InvalidAddress)?;

    let mut payload = [0xffu8; MAGIC_PACKET_LEN];
    for repeat in 0..16 {
        let start = 6 + repeat * 6;
        payload[start..start + 6].copy_from_slice(&mac_bytes);
    }
    Ok(payload)
}

/// Broadcasts wake payloads for the target's hardware address
pub struct MagicPacketTransmitter {
    broadcast: SocketAddr,
}

impl Default for MagicPacketTransmitter {
    fn default() -> Self {
        Self {
            broadcast: SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::BROADCAST, WOL_PORT)),
        }
    }
}

impl MagicPacketTransmitter {
    pub fn new(broadcast: SocketAddr) -> Self {
        Self { broadcast }
    }

    /// Validate the address and hand one magic packet to the network stack
    pub async fn wake(&self, mac: &str) -> Result<(), WakeError> {
        let payload = build_payload(mac)?;

        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).await?;
        socket.set_broadcast(true)?;
        socket.send_to(&payload, self.broadcast).await?;

        info!(mac = %mac, broadcast = %self.broadcast, "magic packet sent");
        Ok(())
    }
}
