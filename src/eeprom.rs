use crate::controller::{
	Controller,
	ControllerPort,
	Transaction,
};

pub const EEPROM_ADDRESS: u8 = 0xa0 >> 1;
pub const EEPROM_SIZE: usize = 256;
pub const EEPROM_PAGE_SIZE: usize = 16;

// address polls while the device runs its internal write cycle (5ms max)
const ACK_POLL_LIMIT: usize = 1000;

/// Fail unless `len` bytes starting at `offset` lie inside the array.
pub fn check_range(offset: usize, len: usize) -> crate::AResult<()> {
	ensure!(offset < EEPROM_SIZE && len <= EEPROM_SIZE - offset,
		"range 0x{:02x}+{} exceeds EEPROM size {}", offset, len, EEPROM_SIZE
	);
	Ok(())
}

/// General purpose EEPROM array, one byte word addresses.
pub struct Eeprom<'c, P: ControllerPort> {
	controller: &'c mut Controller<P>,
	address: u8,
}

impl<'c, P: ControllerPort> Eeprom<'c, P> {
	pub fn new(controller: &'c mut Controller<P>) -> Self {
		Eeprom::at(controller, EEPROM_ADDRESS)
	}

	/// EEPROM on a different slave address (address pins strapped).
	pub fn at(controller: &'c mut Controller<P>, address: u8) -> Self {
		Eeprom {
			controller,
			address,
		}
	}

	pub fn address(&self) -> u8 {
		self.address
	}

	/// Random read starting at `offset`.
	pub fn read(&mut self, offset: usize, target: &mut [u8]) -> crate::AResult<()> {
		check_range(offset, target.len())?;
		if target.is_empty() {
			return Ok(());
		}
		let word = [offset as u8];
		self.controller.try_transfer(&mut Transaction::new(self.address, &word, target))?;
		Ok(())
	}

	pub fn read_byte(&mut self, offset: usize) -> crate::AResult<u8> {
		let mut data = [0u8; 1];
		self.read(offset, &mut data)?;
		Ok(data[0])
	}

	/// Write `data` at `offset`, one page write per touched page.
	pub fn write(&mut self, offset: usize, data: &[u8]) -> crate::AResult<()> {
		check_range(offset, data.len())?;
		let mut offset = offset;
		let mut rest = data;
		while !rest.is_empty() {
			let room = EEPROM_PAGE_SIZE - offset % EEPROM_PAGE_SIZE;
			let (chunk, tail) = rest.split_at(room.min(rest.len()));
			self.write_page(offset, chunk)?;
			offset += chunk.len();
			rest = tail;
		}
		Ok(())
	}

	fn write_page(&mut self, offset: usize, chunk: &[u8]) -> crate::AResult<()> {
		let mut buf = Vec::with_capacity(1 + chunk.len());
		buf.push(offset as u8);
		buf.extend_from_slice(chunk);
		trace!("EEPROM page write at 0x{:02x}: {} bytes", offset, chunk.len());
		self.controller.try_transfer(&mut Transaction::write(self.address, &buf))?;
		self.wait_write_cycle(offset)
	}

	// acknowledge polling: the device ignores its address until the
	// internal write cycle is done
	fn wait_write_cycle(&mut self, offset: usize) -> crate::AResult<()> {
		let word = [offset as u8];
		for attempt in 0..ACK_POLL_LIMIT {
			if self.controller.transfer(&mut Transaction::write(self.address, &word)) {
				if attempt > 0 {
					trace!("EEPROM write cycle done after {} polls", attempt);
				}
				return Ok(());
			}
		}
		bail!("EEPROM 0x{:02x} still busy writing 0x{:02x} after {} polls", self.address, offset, ACK_POLL_LIMIT);
	}
}
