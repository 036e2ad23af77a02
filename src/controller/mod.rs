//! Polled master transfers on a burst-mode I2C controller.
//!
//! The controller is driven through a handful of primitives: latch a slave
//! address together with the direction bit, load or fetch the data
//! register, start a command and poll the busy/error status. Multi-byte
//! transfers are framed as start / continue... / finish commands; a lone
//! byte uses the single-shot command instead.
//!
//! Everything here blocks: a step spins on the busy flag until the
//! controller reports idle. Without a busy limit a missing device or a
//! stuck bus hangs the caller forever.

use std::fmt;

mod transfer;

pub use self::transfer::{
	Phase,
	Transaction,
	TransferError,
};

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum Command {
	/// START, one byte, STOP
	SingleSend,
	BurstSendStart,
	BurstSendContinue,
	BurstSendFinish,
	BurstReceiveStart,
	BurstReceiveContinue,
	BurstReceiveFinish,
	/// closing STOP after the last received byte
	BurstReceiveStop,
	/// START, one byte answered with NACK, STOP
	SingleReceive,
}

impl Command {
	pub fn is_receive(self) -> bool {
		match self {
			Command::BurstReceiveStart
			| Command::BurstReceiveContinue
			| Command::BurstReceiveFinish
			| Command::BurstReceiveStop
			| Command::SingleReceive => true,
			_ => false,
		}
	}

	/// Commands putting a START condition on the bus.
	pub fn is_start(self) -> bool {
		match self {
			Command::SingleSend
			| Command::BurstSendStart
			| Command::BurstReceiveStart
			| Command::SingleReceive => true,
			_ => false,
		}
	}

	/// Commands putting a STOP condition on the bus.
	pub fn is_stop(self) -> bool {
		match self {
			Command::SingleSend
			| Command::BurstSendFinish
			| Command::BurstReceiveFinish
			| Command::BurstReceiveStop
			| Command::SingleReceive => true,
			_ => false,
		}
	}

	// a burst start can't report a transfer error yet
	pub(crate) fn is_checked(self) -> bool {
		match self {
			Command::BurstSendStart | Command::BurstReceiveStart => false,
			_ => true,
		}
	}
}

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum BusFault {
	AddressNack,
	DataNack,
	ArbitrationLost,
	Other,
}

impl fmt::Display for BusFault {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		let msg = match self {
			BusFault::AddressNack => "slave address not acknowledged",
			BusFault::DataNack => "data not acknowledged",
			BusFault::ArbitrationLost => "arbitration lost",
			BusFault::Other => "controller error",
		};
		f.write_str(msg)
	}
}

/// Outcome of one polled bus step.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum BusStatus {
	Ok,
	Error(BusFault),
	/// busy limit exhausted while the controller still reported busy
	Busy,
}

/// Register-level access to one I2C master instance.
pub trait ControllerPort {
	/// `address` is the 7-bit slave address; `read` selects the direction
	/// bit for the next START.
	fn set_slave_address(&mut self, address: u8, read: bool);
	fn put_data(&mut self, data: u8);
	fn get_data(&mut self) -> u8;
	fn issue_command(&mut self, command: Command);
	fn is_busy(&mut self) -> bool;
	fn error(&mut self) -> Option<BusFault>;
}

impl<'a, P: ?Sized + ControllerPort> ControllerPort for &'a mut P {
	fn set_slave_address(&mut self, address: u8, read: bool) {
		P::set_slave_address(*self, address, read)
	}
	fn put_data(&mut self, data: u8) {
		P::put_data(*self, data)
	}
	fn get_data(&mut self) -> u8 {
		P::get_data(*self)
	}
	fn issue_command(&mut self, command: Command) {
		P::issue_command(*self, command)
	}
	fn is_busy(&mut self) -> bool {
		P::is_busy(*self)
	}
	fn error(&mut self) -> Option<BusFault> {
		P::error(*self)
	}
}

/// Handle for one I2C master.
///
/// All operations take `&mut self`; sharing a controller between threads
/// needs an external lock around it.
#[derive(Debug)]
pub struct Controller<P: ControllerPort> {
	port: P,
	busy_limit: Option<u32>,
}

impl<P: ControllerPort> Controller<P> {
	pub fn new(port: P) -> Self {
		Controller {
			port,
			busy_limit: None,
		}
	}

	/// Give up a step after `polls` busy polls (at least one) instead of
	/// spinning forever.
	pub fn with_busy_limit(mut self, polls: u32) -> Self {
		self.busy_limit = Some(polls);
		self
	}

	pub fn set_busy_limit(&mut self, busy_limit: Option<u32>) {
		self.busy_limit = busy_limit;
	}

	pub fn busy_limit(&self) -> Option<u32> {
		self.busy_limit
	}

	pub fn port(&self) -> &P {
		&self.port
	}

	pub fn port_mut(&mut self) -> &mut P {
		&mut self.port
	}

	pub fn into_port(self) -> P {
		self.port
	}

	// returns false if the busy limit ran out
	fn wait_idle(&mut self) -> bool {
		match self.busy_limit {
			None => {
				while self.port.is_busy() {}
				true
			},
			Some(limit) => {
				// a zero limit still looks once
				for _ in 0..limit.max(1) {
					if !self.port.is_busy() {
						return true;
					}
				}
				false
			},
		}
	}

	/// Wait for the current command to complete and collect its status.
	///
	/// With `check_error == false` only the busy wait happens; a start
	/// command has nothing to report yet.
	pub fn poll_status(&mut self, check_error: bool) -> BusStatus {
		if !self.wait_idle() {
			return BusStatus::Busy;
		}
		if !check_error {
			return BusStatus::Ok;
		}
		match self.port.error() {
			None => BusStatus::Ok,
			Some(fault) => BusStatus::Error(fault),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	struct Spinning {
		busy_left: u32,
		polls: u32,
	}

	impl ControllerPort for Spinning {
		fn set_slave_address(&mut self, _address: u8, _read: bool) {}
		fn put_data(&mut self, _data: u8) {}
		fn get_data(&mut self) -> u8 { 0 }
		fn issue_command(&mut self, _command: Command) {}
		fn is_busy(&mut self) -> bool {
			self.polls += 1;
			if self.busy_left == 0 {
				return false;
			}
			self.busy_left -= 1;
			true
		}
		fn error(&mut self) -> Option<BusFault> {
			Some(BusFault::DataNack)
		}
	}

	#[test]
	fn unlimited_wait_spins_until_idle() {
		let mut c = Controller::new(Spinning { busy_left: 1000, polls: 0 });
		assert_eq!(c.poll_status(false), BusStatus::Ok);
		assert_eq!(c.port().polls, 1001);
	}

	#[test]
	fn busy_limit_gives_up() {
		let mut c = Controller::new(Spinning { busy_left: 1000, polls: 0 }).with_busy_limit(10);
		assert_eq!(c.poll_status(true), BusStatus::Busy);
		assert_eq!(c.port().polls, 10);
	}

	#[test]
	fn zero_busy_limit_polls_once() {
		let mut c = Controller::new(Spinning { busy_left: 0, polls: 0 }).with_busy_limit(0);
		assert_eq!(c.poll_status(false), BusStatus::Ok);
		assert_eq!(c.port().polls, 1);

		let mut c = Controller::new(Spinning { busy_left: 5, polls: 0 }).with_busy_limit(0);
		assert_eq!(c.poll_status(false), BusStatus::Busy);
		assert_eq!(c.port().polls, 1);
	}

	#[test]
	fn error_only_reported_when_checked() {
		let mut c = Controller::new(Spinning { busy_left: 2, polls: 0 }).with_busy_limit(10);
		assert_eq!(c.poll_status(false), BusStatus::Ok);
		assert_eq!(c.poll_status(true), BusStatus::Error(BusFault::DataNack));
	}

	#[test]
	fn command_classes() {
		assert!(Command::SingleReceive.is_receive());
		assert!(!Command::BurstSendFinish.is_receive());
		assert!(Command::SingleSend.is_start() && Command::SingleSend.is_stop());
		assert!(!Command::BurstSendStart.is_checked());
		assert!(!Command::BurstReceiveStart.is_checked());
		assert!(Command::BurstReceiveStop.is_checked());
	}
}
