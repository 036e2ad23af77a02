use std::fmt;

use failure::Fail;

use super::{
	BusFault,
	BusStatus,
	Command,
	Controller,
	ControllerPort,
};

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum Phase {
	Write,
	Read,
}

impl fmt::Display for Phase {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match self {
			Phase::Write => f.write_str("write"),
			Phase::Read => f.write_str("read"),
		}
	}
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Fail)]
pub enum TransferError {
	#[fail(display = "nothing to transfer for slave 0x{:02x}", address)]
	Empty {
		address: u8,
	},
	#[fail(display = "not a 7-bit slave address: 0x{:02x}", address)]
	InvalidAddress {
		address: u8,
	},
	#[fail(display = "slave 0x{:02x}: {} of byte {} failed: {}", address, phase, index, fault)]
	Bus {
		address: u8,
		phase: Phase,
		index: usize,
		fault: BusFault,
	},
	#[fail(display = "slave 0x{:02x}: controller still busy after {} of byte {}", address, phase, index)]
	Timeout {
		address: u8,
		phase: Phase,
		index: usize,
	},
}

impl TransferError {
	/// Rejected before anything was put on the bus.
	pub fn is_malformed(&self) -> bool {
		match self {
			TransferError::Empty { .. } | TransferError::InvalidAddress { .. } => true,
			_ => false,
		}
	}
}

/// One master transaction: an optional write phase followed by an
/// optional read phase, both addressing the same slave.
///
/// An empty write slice skips the write phase, an empty read buffer skips
/// the read phase. The read buffer is filled completely on success.
#[derive(Debug)]
pub struct Transaction<'a> {
	address: u8,
	write: &'a [u8],
	read: &'a mut [u8],
}

impl<'a> Transaction<'a> {
	pub fn new(address: u8, write: &'a [u8], read: &'a mut [u8]) -> Self {
		Transaction {
			address,
			write,
			read,
		}
	}

	pub fn write(address: u8, write: &'a [u8]) -> Self {
		Transaction::new(address, write, Default::default())
	}

	pub fn read(address: u8, read: &'a mut [u8]) -> Self {
		Transaction::new(address, &[], read)
	}

	pub fn address(&self) -> u8 {
		self.address
	}

	pub fn write_data(&self) -> &[u8] {
		self.write
	}

	pub fn read_buffer(&self) -> &[u8] {
		self.read
	}

	pub fn write_count(&self) -> usize {
		self.write.len()
	}

	pub fn read_count(&self) -> usize {
		self.read.len()
	}
}

// framing command for byte `index` of `len` bytes
fn framing(phase: Phase, index: usize, len: usize) -> Command {
	let first = 0 == index;
	let last = index + 1 == len;
	match (phase, first, last) {
		(Phase::Write, true, true) => Command::SingleSend,
		(Phase::Write, true, false) => Command::BurstSendStart,
		(Phase::Write, false, false) => Command::BurstSendContinue,
		(Phase::Write, false, true) => Command::BurstSendFinish,
		(Phase::Read, true, true) => Command::SingleReceive,
		(Phase::Read, true, false) => Command::BurstReceiveStart,
		(Phase::Read, false, false) => Command::BurstReceiveContinue,
		(Phase::Read, false, true) => Command::BurstReceiveFinish,
	}
}

impl<P: ControllerPort> Controller<P> {
	/// Run `transaction`, reporting only success or failure.
	///
	/// The reason for a failure is logged at debug level.
	pub fn transfer(&mut self, transaction: &mut Transaction) -> bool {
		match self.try_transfer(transaction) {
			Ok(()) => true,
			Err(e) => {
				debug!("I2C transfer failed: {}", e);
				false
			},
		}
	}

	/// Run `transaction`; the first failing bus step aborts it.
	///
	/// Nothing is issued after the failing step, and there is no retry. Bytes
	/// received before the failure stay in the read buffer.
	pub fn try_transfer(&mut self, transaction: &mut Transaction) -> Result<(), TransferError> {
		let address = transaction.address;
		if transaction.write.is_empty() && transaction.read.is_empty() {
			return Err(TransferError::Empty { address });
		}
		if address > 0x7f {
			return Err(TransferError::InvalidAddress { address });
		}

		if !transaction.write.is_empty() {
			self.write_phase(address, transaction.write)?;
		}
		if !transaction.read.is_empty() {
			self.read_phase(address, &mut *transaction.read)?;
		}
		Ok(())
	}

	fn write_phase(&mut self, address: u8, data: &[u8]) -> Result<(), TransferError> {
		for (index, &byte) in data.iter().enumerate() {
			let command = framing(Phase::Write, index, data.len());
			trace!("I2C 0x{:02x}: {:?} 0x{:02x}", address, command, byte);
			// the controller doesn't keep the address across burst steps
			self.port.set_slave_address(address, false);
			self.port.put_data(byte);
			self.port.issue_command(command);
			self.settle(address, Phase::Write, index, command)?;
		}
		Ok(())
	}

	fn read_phase(&mut self, address: u8, target: &mut [u8]) -> Result<(), TransferError> {
		let len = target.len();
		for (index, slot) in target.iter_mut().enumerate() {
			let command = framing(Phase::Read, index, len);
			self.port.set_slave_address(address, true);
			self.port.issue_command(command);
			self.settle(address, Phase::Read, index, command)?;
			*slot = self.port.get_data();
			trace!("I2C 0x{:02x}: {:?} -> 0x{:02x}", address, command, *slot);
		}
		if len > 1 {
			trace!("I2C 0x{:02x}: {:?}", address, Command::BurstReceiveStop);
			self.port.issue_command(Command::BurstReceiveStop);
			self.settle(address, Phase::Read, len - 1, Command::BurstReceiveStop)?;
		}
		Ok(())
	}

	fn settle(&mut self, address: u8, phase: Phase, index: usize, command: Command) -> Result<(), TransferError> {
		match self.poll_status(command.is_checked()) {
			BusStatus::Ok => Ok(()),
			BusStatus::Error(fault) => Err(TransferError::Bus { address, phase, index, fault }),
			BusStatus::Busy => Err(TransferError::Timeout { address, phase, index }),
		}
	}
}
