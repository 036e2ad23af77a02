use std::fmt;

use crate::controller::{
	BusFault,
	Command,
};

// master control/status register: write side
const MCS_RUN:    u32 = 0x01;
const MCS_START:  u32 = 0x02;
const MCS_STOP:   u32 = 0x04;
const MCS_ACK:    u32 = 0x08;

// read side
const MCS_BUSY:   u32 = 0x01;
const MCS_ERROR:  u32 = 0x02;
const MCS_ADRACK: u32 = 0x04; // address was not acknowledged
const MCS_DATACK: u32 = 0x08; // data was not acknowledged
const MCS_ARBLST: u32 = 0x10;
const MCS_IDLE:   u32 = 0x20;
const MCS_BUSBSY: u32 = 0x40;

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MasterStatus(pub u32);

impl MasterStatus {
	pub fn is_busy(&self) -> bool {
		0 != self.0 & MCS_BUSY
	}
	pub fn is_error(&self) -> bool {
		0 != self.0 & MCS_ERROR
	}
	pub fn is_address_nack(&self) -> bool {
		0 != self.0 & MCS_ADRACK
	}
	pub fn is_data_nack(&self) -> bool {
		0 != self.0 & MCS_DATACK
	}
	pub fn is_arbitration_lost(&self) -> bool {
		0 != self.0 & MCS_ARBLST
	}
	pub fn is_idle(&self) -> bool {
		0 != self.0 & MCS_IDLE
	}
	pub fn is_bus_busy(&self) -> bool {
		0 != self.0 & MCS_BUSBSY
	}

	/// Error of the last completed command; nothing while still busy.
	pub fn fault(&self) -> Option<BusFault> {
		if self.is_busy() {
			return None;
		}
		if self.is_arbitration_lost() {
			Some(BusFault::ArbitrationLost)
		} else if !self.is_error() {
			None
		} else if self.is_address_nack() {
			Some(BusFault::AddressNack)
		} else if self.is_data_nack() {
			Some(BusFault::DataNack)
		} else {
			Some(BusFault::Other)
		}
	}
}

impl fmt::Display for MasterStatus {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "0x{:02x}", self.0)
	}
}

impl fmt::Debug for MasterStatus {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "0x{:02x} (", self.0)?;
		if self.is_busy() { write!(f, " [BUSY]")?; }
		if self.is_error() { write!(f, " [ERROR]")?; }
		if self.is_address_nack() { write!(f, " [ADRACK]")?; }
		if self.is_data_nack() { write!(f, " [DATACK]")?; }
		if self.is_arbitration_lost() { write!(f, " [ARBLST]")?; }
		if self.is_idle() { write!(f, " [IDLE]")?; }
		if self.is_bus_busy() { write!(f, " [BUSBSY]")?; }
		write!(f, " )")
	}
}

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MasterControl(pub u32);

impl MasterControl {
	pub fn from_command(command: Command) -> Self {
		let mut ctl = MasterControl(0);
		match command {
			Command::SingleSend | Command::SingleReceive => {
				ctl.set_start().set_run().set_stop();
			},
			Command::BurstSendStart => {
				ctl.set_start().set_run();
			},
			Command::BurstSendContinue => {
				ctl.set_run();
			},
			Command::BurstSendFinish | Command::BurstReceiveFinish => {
				ctl.set_run().set_stop();
			},
			Command::BurstReceiveStart => {
				ctl.set_ack().set_start().set_run();
			},
			Command::BurstReceiveContinue => {
				ctl.set_ack().set_run();
			},
			Command::BurstReceiveStop => {
				ctl.set_stop();
			},
		}
		ctl
	}

	pub fn is_run(&self) -> bool {
		0 != self.0 & MCS_RUN
	}
	pub fn set_run(&mut self) -> &mut Self {
		self.0 |= MCS_RUN;
		self
	}

	pub fn is_start(&self) -> bool {
		0 != self.0 & MCS_START
	}
	pub fn set_start(&mut self) -> &mut Self {
		self.0 |= MCS_START;
		self
	}

	pub fn is_stop(&self) -> bool {
		0 != self.0 & MCS_STOP
	}
	pub fn set_stop(&mut self) -> &mut Self {
		self.0 |= MCS_STOP;
		self
	}

	pub fn is_ack(&self) -> bool {
		0 != self.0 & MCS_ACK
	}
	pub fn set_ack(&mut self) -> &mut Self {
		self.0 |= MCS_ACK;
		self
	}
}

impl fmt::Display for MasterControl {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "0x{:02x}", self.0)
	}
}

impl fmt::Debug for MasterControl {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "0x{:02x} (", self.0)?;
		if self.is_run() { write!(f, " [RUN]")?; }
		if self.is_start() { write!(f, " [START]")?; }
		if self.is_stop() { write!(f, " [STOP]")?; }
		if self.is_ack() { write!(f, " [ACK]")?; }
		write!(f, " )")
	}
}
