//! Factory identity of an AT24MAC-style EEPROM: a 128-bit serial number and
//! an EUI-48 MAC address in the write-protected extended memory.

use std::fmt;

use crate::controller::{
	Controller,
	ControllerPort,
	Transaction,
};

pub const ID_ADDRESS: u8 = 0x58;
pub const MAC_ADDRESS: u8 = 0x59;

/// High bit selects the serial number region; also resets the word pointer.
pub const SERIAL_WORD_ADDRESS: u8 = 0x80;
pub const MAC_WORD_ADDRESS: u8 = 0x9a;

pub const SERIAL_LEN: usize = 16;
pub const MAC_LEN: usize = 6;

/// Fill pattern of an identity field that couldn't be read.
pub const SENTINEL: u8 = 0xff;

/// Read serial number and MAC into the given buffers.
///
/// Both buffers start out as all `SENTINEL`; a buffer whose transaction
/// fails is reset to it. The MAC is read even if the serial number failed,
/// and only the MAC transaction decides the return value: a failed serial
/// number is visible solely as the sentinel pattern in `serial`.
pub fn read_identity<P: ControllerPort>(
	controller: &mut Controller<P>,
	serial: &mut [u8; SERIAL_LEN],
	mac: &mut [u8; MAC_LEN],
) -> bool {
	*serial = [SENTINEL; SERIAL_LEN];
	*mac = [SENTINEL; MAC_LEN];

	if !controller.transfer(&mut Transaction::new(ID_ADDRESS, &[SERIAL_WORD_ADDRESS], serial)) {
		*serial = [SENTINEL; SERIAL_LEN];
		warn!("couldn't read serial number from I2C slave 0x{:02x}", ID_ADDRESS);
	}

	if !controller.transfer(&mut Transaction::new(MAC_ADDRESS, &[MAC_WORD_ADDRESS], mac)) {
		*mac = [SENTINEL; MAC_LEN];
		warn!("couldn't read MAC address from I2C slave 0x{:02x}", MAC_ADDRESS);
		return false;
	}
	true
}

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Identity {
	pub serial: [u8; SERIAL_LEN],
	pub mac: [u8; MAC_LEN],
}

impl Default for Identity {
	fn default() -> Self {
		Identity {
			serial: [SENTINEL; SERIAL_LEN],
			mac: [SENTINEL; MAC_LEN],
		}
	}
}

impl Identity {
	/// See `read_identity`; the flag is its return value.
	pub fn read<P: ControllerPort>(controller: &mut Controller<P>) -> (Self, bool) {
		let mut identity = Identity::default();
		let ok = read_identity(controller, &mut identity.serial, &mut identity.mac);
		(identity, ok)
	}

	pub fn has_serial(&self) -> bool {
		self.serial.iter().any(|&b| b != SENTINEL)
	}

	pub fn has_mac(&self) -> bool {
		self.mac.iter().any(|&b| b != SENTINEL)
	}

	pub fn serial_hex(&self) -> String {
		self.serial.iter().map(|b| format!("{:02x}", b)).collect()
	}

	pub fn mac_string(&self) -> String {
		self.mac.iter().map(|b| format!("{:02x}", b)).collect::<Vec<_>>().join(":")
	}
}

impl fmt::Display for Identity {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "serial {} MAC {}", self.serial_hex(), self.mac_string())
	}
}

impl fmt::Debug for Identity {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "Identity({})", self)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn constants() {
		assert_eq!(ID_ADDRESS, 0x58);
		assert_eq!(MAC_ADDRESS, 0x59);
	}

	#[test]
	fn formatting() {
		let identity = Identity {
			serial: [0x0a; SERIAL_LEN],
			mac: [0xfc, 0xc2, 0x3d, 0x01, 0x02, 0xab],
		};
		assert_eq!(identity.mac_string(), "fc:c2:3d:01:02:ab");
		assert_eq!(identity.serial_hex(), "0a".repeat(16));
		assert!(identity.has_serial() && identity.has_mac());
		assert!(!Identity::default().has_mac());
	}
}
