//! Memory-mapped burst-mode I2C master.
//!
//! Register block (byte offsets, 32-bit registers):
//! - 0x000 MSA: slave address (bits 7:1) and receive flag (bit 0)
//! - 0x004 MCS: control (write) / status (read)
//! - 0x008 MDR: data
//! - 0x00c MTPR: SCL timer period
//! - 0x020 MCR: configuration, master function enable

use crate::controller::{
	BusFault,
	Command,
	Controller,
	ControllerPort,
};

mod mapped;
mod mcs;

pub use self::mapped::Mapped;
pub use self::mcs::{
	MasterControl,
	MasterStatus,
};

pub const MSA: usize = 0x000;
pub const MCS: usize = 0x004;
pub const MDR: usize = 0x008;
pub const MTPR: usize = 0x00c;
pub const MCR: usize = 0x020;
pub const REGISTER_BLOCK_LEN: usize = 0x024;

const MCR_MFE: u32 = 0x10;
const MTPR_MAX: u32 = 0x7f;
// SCL low and high period in timer ticks
const SCL_LP: u32 = 6;
const SCL_HP: u32 = 4;

pub trait RegisterWindow {
	fn len(&self) -> usize;
	fn read_dword(&self, offset: usize) -> u32;
	fn write_dword(&mut self, offset: usize, data: u32);
}

impl<'a, W: ?Sized + RegisterWindow> RegisterWindow for &'a mut W {
	fn len(&self) -> usize {
		W::len(*self)
	}
	fn read_dword(&self, offset: usize) -> u32 {
		W::read_dword(*self, offset)
	}
	fn write_dword(&mut self, offset: usize, data: u32) {
		W::write_dword(*self, offset, data)
	}
}

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum BusSpeed {
	/// 100 kHz
	Standard,
	/// 400 kHz
	Fast,
}

impl BusSpeed {
	pub fn frequency(self) -> u32 {
		match self {
			BusSpeed::Standard => 100_000,
			BusSpeed::Fast => 400_000,
		}
	}
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct ControllerConfig {
	/// clock feeding the I2C module, in Hz
	pub system_clock: u32,
	pub bus_speed: BusSpeed,
	/// polls per bus step before giving up; `None` spins forever
	pub busy_limit: Option<u32>,
}

impl Default for ControllerConfig {
	fn default() -> Self {
		ControllerConfig {
			system_clock: 16_000_000,
			bus_speed: BusSpeed::Standard,
			busy_limit: None,
		}
	}
}

impl ControllerConfig {
	/// MTPR value: SCL period is `2 * (SCL_LP + SCL_HP) * (1 + TPR)` clocks,
	/// rounded so the bus never runs faster than requested.
	pub fn timer_period(&self) -> crate::AResult<u32> {
		ensure!(0 != self.system_clock, "system clock must not be zero");
		let ticks = u64::from(2 * (SCL_LP + SCL_HP) * self.bus_speed.frequency());
		let divider = (u64::from(self.system_clock) + ticks - 1) / ticks;
		ensure!(divider >= 2,
			"system clock {} Hz too slow for {} Hz SCL", self.system_clock, self.bus_speed.frequency()
		);
		let tpr = divider - 1;
		ensure!(tpr <= u64::from(MTPR_MAX),
			"system clock {} Hz too fast for {} Hz SCL (timer period {} > {})",
			self.system_clock, self.bus_speed.frequency(), tpr, MTPR_MAX
		);
		Ok(tpr as u32)
	}
}

#[derive(Debug)]
pub struct MmioController<W: RegisterWindow> {
	window: W,
}

impl<W: RegisterWindow> MmioController<W> {
	/// Enable the master function and program the SCL timer.
	pub fn init(mut window: W, config: &ControllerConfig) -> crate::AResult<Self> {
		ensure!(window.len() >= REGISTER_BLOCK_LEN,
			"register window too small: {} bytes (need {})", window.len(), REGISTER_BLOCK_LEN
		);
		let tpr = config.timer_period()?;
		window.write_dword(MCR, MCR_MFE);
		window.write_dword(MTPR, tpr);
		debug!("I2C master enabled: {} Hz SCL from {} Hz clock (MTPR {})",
			config.bus_speed.frequency(), config.system_clock, tpr);
		Ok(MmioController { window })
	}

	pub fn status(&self) -> MasterStatus {
		MasterStatus(self.window.read_dword(MCS))
	}

	pub fn window(&self) -> &W {
		&self.window
	}

	pub fn into_window(self) -> W {
		self.window
	}
}

impl<W: RegisterWindow> ControllerPort for MmioController<W> {
	fn set_slave_address(&mut self, address: u8, read: bool) {
		let msa = (u32::from(address & 0x7f) << 1) | if read { 1 } else { 0 };
		self.window.write_dword(MSA, msa);
	}

	fn put_data(&mut self, data: u8) {
		self.window.write_dword(MDR, u32::from(data));
	}

	fn get_data(&mut self) -> u8 {
		self.window.read_dword(MDR) as u8
	}

	fn issue_command(&mut self, command: Command) {
		let ctl = MasterControl::from_command(command);
		trace!("MCS write: {:?}", ctl);
		self.window.write_dword(MCS, ctl.0);
	}

	fn is_busy(&mut self) -> bool {
		self.status().is_busy()
	}

	fn error(&mut self) -> Option<BusFault> {
		let status = self.status();
		let fault = status.fault();
		if fault.is_some() {
			trace!("MCS read: {:?}", status);
		}
		fault
	}
}

/// Map the register block at physical `base` of `path` and initialize it.
pub fn open_controller(path: &str, base: usize, config: &ControllerConfig) -> crate::AResult<Controller<MmioController<Mapped>>> {
	let window = with_context!(("couldn't map {} at 0x{:x}", path, base), {
		Ok(mapped::inner_open(path, base, REGISTER_BLOCK_LEN, true)?)
	})?;
	let mut controller = Controller::new(MmioController::init(window, config)?);
	controller.set_busy_limit(config.busy_limit);
	Ok(controller)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::controller::Transaction;

	// registers as plain memory; MCS reads back whatever `status` says
	struct FakeRegisters {
		regs: [u32; REGISTER_BLOCK_LEN / 4],
		status: u32,
		writes: Vec<(usize, u32)>,
	}

	impl FakeRegisters {
		fn new() -> Self {
			FakeRegisters {
				regs: [0; REGISTER_BLOCK_LEN / 4],
				status: 0x20,
				writes: Vec::new(),
			}
		}
	}

	impl RegisterWindow for FakeRegisters {
		fn len(&self) -> usize {
			REGISTER_BLOCK_LEN
		}
		fn read_dword(&self, offset: usize) -> u32 {
			if MCS == offset {
				return self.status;
			}
			self.regs[offset / 4]
		}
		fn write_dword(&mut self, offset: usize, data: u32) {
			self.writes.push((offset, data));
			self.regs[offset / 4] = data;
		}
	}

	#[test]
	fn timer_period() {
		let config = ControllerConfig { system_clock: 20_000_000, ..Default::default() };
		assert_eq!(config.timer_period().unwrap(), 9);
		let config = ControllerConfig { system_clock: 80_000_000, bus_speed: BusSpeed::Fast, busy_limit: None };
		assert_eq!(config.timer_period().unwrap(), 9);
		assert_eq!(ControllerConfig::default().timer_period().unwrap(), 7);

		assert!(ControllerConfig { system_clock: 0, ..Default::default() }.timer_period().is_err());
		assert!(ControllerConfig { system_clock: 1_000_000, ..Default::default() }.timer_period().is_err());
		assert!(ControllerConfig { system_clock: 400_000_000, ..Default::default() }.timer_period().is_err());
		assert!(ControllerConfig { system_clock: u32::max_value(), ..Default::default() }.timer_period().is_err());
		let config = ControllerConfig { system_clock: u32::max_value(), bus_speed: BusSpeed::Fast, busy_limit: None };
		assert!(config.timer_period().is_err());
	}

	#[test]
	fn init_programs_master() {
		let config = ControllerConfig { system_clock: 20_000_000, ..Default::default() };
		let mmio = MmioController::init(FakeRegisters::new(), &config).unwrap();
		assert_eq!(mmio.window().writes, vec![(MCR, 0x10), (MTPR, 9)]);
	}

	#[test]
	fn init_rejects_short_window() {
		struct Short;
		impl RegisterWindow for Short {
			fn len(&self) -> usize { 0x10 }
			fn read_dword(&self, _offset: usize) -> u32 { 0 }
			fn write_dword(&mut self, _offset: usize, _data: u32) {}
		}
		assert!(MmioController::init(Short, &ControllerConfig::default()).is_err());
	}

	#[test]
	fn single_byte_read_register_sequence() {
		let mut regs = FakeRegisters::new();
		regs.regs[MDR / 4] = 0xa5;
		let mmio = MmioController::init(&mut regs, &ControllerConfig::default()).unwrap();
		let mut controller = Controller::new(mmio);

		let mut buf = [0u8; 1];
		assert!(controller.transfer(&mut Transaction::read(0x58, &mut buf)));
		assert_eq!(buf, [0xa5]);
		drop(controller);

		assert_eq!(&regs.writes[2..], &[(MSA, 0xb1), (MCS, 0x07)]);
	}

	#[test]
	fn write_register_sequence() {
		let mut regs = FakeRegisters::new();
		let mmio = MmioController::init(&mut regs, &ControllerConfig::default()).unwrap();
		let mut controller = Controller::new(mmio);

		assert!(controller.transfer(&mut Transaction::write(0x50, &[0x10, 0x22])));
		drop(controller);

		assert_eq!(&regs.writes[2..], &[
			(MSA, 0xa0), (MDR, 0x10), (MCS, 0x03),
			(MSA, 0xa0), (MDR, 0x22), (MCS, 0x05),
		]);
	}

	#[test]
	fn reports_address_nack() {
		let mut regs = FakeRegisters::new();
		regs.status = 0x02 | 0x04;
		let mut mmio = MmioController::init(&mut regs, &ControllerConfig::default()).unwrap();
		assert_eq!(mmio.error(), Some(BusFault::AddressNack));
		assert!(!mmio.is_busy());

		let mut controller = Controller::new(mmio);
		assert!(!controller.transfer(&mut Transaction::write(0x50, &[0x00])));
	}
}
