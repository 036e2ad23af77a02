//! Simulated controller with devices on its bus.
//!
//! `SimBus` behaves like the burst-mode master as seen through
//! `ControllerPort`: a START addresses the slave latched by the last
//! `set_slave_address`, the first written byte after a START sets the
//! device's word pointer, further written bytes are stored (wrapping inside
//! the device page), received bytes come from the word pointer onwards.
//! Every primitive call except busy polling is recorded.

use std::collections::BTreeMap;

use crate::controller::{
	BusFault,
	Command,
	ControllerPort,
};
use crate::identity::{
	ID_ADDRESS,
	MAC_ADDRESS,
	MAC_WORD_ADDRESS,
	SERIAL_WORD_ADDRESS,
};
use crate::eeprom::{
	EEPROM_ADDRESS,
	EEPROM_PAGE_SIZE,
};

const MEMORY_SIZE: usize = 256;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Event {
	SetSlaveAddress {
		address: u8,
		read: bool,
	},
	PutData(u8),
	GetData(u8),
	Command(Command),
}

/// 256 bytes of device memory behind a one-byte word pointer.
#[derive(Clone, Debug)]
pub struct SimDevice {
	memory: Vec<u8>,
	pointer: u8,
	page_size: Option<usize>, // None: read only
	write_cycle_nacks: u32,
	write_cycle_left: u32,
}

impl SimDevice {
	/// Memory filled with 0xff, `contents` stored at `offset`.
	pub fn read_only(offset: u8, contents: &[u8]) -> Self {
		let mut memory = vec![0xff; MEMORY_SIZE];
		let start = offset as usize;
		memory[start..start + contents.len()].copy_from_slice(contents);
		SimDevice {
			memory,
			pointer: 0,
			page_size: None,
			write_cycle_nacks: 0,
			write_cycle_left: 0,
		}
	}

	/// Erased (0xff) writable memory; page writes wrap at `page_size`.
	pub fn eeprom(page_size: usize) -> Self {
		assert!(page_size.is_power_of_two() && page_size <= MEMORY_SIZE);
		SimDevice {
			page_size: Some(page_size),
			..SimDevice::read_only(0, &[])
		}
	}

	/// Number of address NACKs the device answers with after a write,
	/// while its internal write cycle runs.
	pub fn with_write_cycle(mut self, nacks: u32) -> Self {
		self.write_cycle_nacks = nacks;
		self
	}

	pub fn memory(&self) -> &[u8] {
		&self.memory
	}

	pub fn memory_mut(&mut self) -> &mut [u8] {
		&mut self.memory
	}

	pub fn pointer(&self) -> u8 {
		self.pointer
	}

	fn next_byte(&mut self) -> u8 {
		let data = self.memory[self.pointer as usize];
		self.pointer = self.pointer.wrapping_add(1);
		data
	}

	fn store(&mut self, data: u8) -> bool {
		let page_size = match self.page_size {
			None => return false,
			Some(p) => p as u8,
		};
		self.memory[self.pointer as usize] = data;
		let page = self.pointer & !(page_size.wrapping_sub(1));
		self.pointer = page | (self.pointer.wrapping_add(1) & page_size.wrapping_sub(1));
		true
	}
}

#[derive(Clone, Copy, Debug)]
struct Active {
	address: u8,
	read: bool,
	// word pointer byte received
	addressed: bool,
	stored: bool,
}

#[derive(Debug, Default)]
pub struct SimBus {
	devices: BTreeMap<u8, SimDevice>,
	events: Vec<Event>,
	slave: (u8, bool),
	data: u8,
	status: Option<BusFault>,
	active: Option<Active>,
	busy_polls: u32,
	busy_left: u32,
	stuck_busy: bool,
	failures: BTreeMap<usize, BusFault>,
	command_count: usize,
}

impl SimBus {
	/// Empty bus: every START is answered with an address NACK.
	pub fn new() -> Self {
		SimBus::default()
	}

	/// ID chip on 0x58 (serial number) and 0x59 (MAC), EEPROM on 0x50.
	pub fn at24mac(serial: &[u8; 16], mac: &[u8; 6]) -> Self {
		let mut bus = SimBus::new();
		bus.attach(ID_ADDRESS, SimDevice::read_only(SERIAL_WORD_ADDRESS, serial));
		bus.attach(MAC_ADDRESS, SimDevice::read_only(MAC_WORD_ADDRESS, mac));
		bus.attach(EEPROM_ADDRESS, SimDevice::eeprom(EEPROM_PAGE_SIZE));
		bus
	}

	pub fn attach(&mut self, address: u8, device: SimDevice) {
		self.devices.insert(address, device);
	}

	pub fn detach(&mut self, address: u8) -> Option<SimDevice> {
		self.devices.remove(&address)
	}

	pub fn device(&self, address: u8) -> Option<&SimDevice> {
		self.devices.get(&address)
	}

	pub fn device_mut(&mut self, address: u8) -> Option<&mut SimDevice> {
		self.devices.get_mut(&address)
	}

	/// Command number `index` (counting from 0 over the bus lifetime)
	/// completes with `fault`.
	pub fn fail_command(&mut self, index: usize, fault: BusFault) {
		self.failures.insert(index, fault);
	}

	/// Every command keeps the controller busy for `polls` polls.
	pub fn set_busy_polls(&mut self, polls: u32) {
		self.busy_polls = polls;
	}

	/// Controller never leaves the busy state.
	pub fn set_stuck_busy(&mut self, stuck: bool) {
		self.stuck_busy = stuck;
	}

	pub fn events(&self) -> &[Event] {
		&self.events
	}

	pub fn clear_events(&mut self) {
		self.events.clear();
	}

	pub fn commands(&self) -> Vec<Command> {
		self.events.iter().filter_map(|e| match e {
			Event::Command(c) => Some(*c),
			_ => None,
		}).collect()
	}

	pub fn address_sets(&self) -> usize {
		self.events.iter().filter(|e| match e {
			Event::SetSlaveAddress { .. } => true,
			_ => false,
		}).count()
	}

	pub fn command_count(&self) -> usize {
		self.command_count
	}

	fn execute(&mut self, command: Command) -> Result<(), BusFault> {
		if let Some(fault) = self.failures.remove(&self.command_count) {
			self.active = None;
			return Err(fault);
		}

		if command.is_start() {
			self.active = None;
			let (address, read) = self.slave;
			let device = self.devices.get_mut(&address).ok_or(BusFault::AddressNack)?;
			if device.write_cycle_left > 0 {
				device.write_cycle_left -= 1;
				return Err(BusFault::AddressNack);
			}
			self.active = Some(Active {
				address,
				read,
				addressed: false,
				stored: false,
			});
		}

		let mut active = match self.active {
			Some(active) => active,
			// STOP without a transfer in progress is harmless
			None if Command::BurstReceiveStop == command => return Ok(()),
			None => return Err(BusFault::Other),
		};
		if Command::BurstReceiveStop == command {
			self.active = None;
			return Ok(());
		}
		if active.read != command.is_receive() {
			self.active = None;
			return Err(BusFault::Other);
		}

		let device = self.devices.get_mut(&active.address).ok_or(BusFault::Other)?;
		if active.read {
			self.data = device.next_byte();
		} else if !active.addressed {
			device.pointer = self.data;
			active.addressed = true;
		} else if device.store(self.data) {
			active.stored = true;
		} else {
			self.active = None;
			return Err(BusFault::DataNack);
		}

		if command.is_stop() {
			if active.stored {
				device.write_cycle_left = device.write_cycle_nacks;
			}
			self.active = None;
		} else {
			self.active = Some(active);
		}
		Ok(())
	}
}

impl ControllerPort for SimBus {
	fn set_slave_address(&mut self, address: u8, read: bool) {
		self.events.push(Event::SetSlaveAddress { address, read });
		self.slave = (address, read);
	}

	fn put_data(&mut self, data: u8) {
		self.events.push(Event::PutData(data));
		self.data = data;
	}

	fn get_data(&mut self) -> u8 {
		self.events.push(Event::GetData(self.data));
		self.data
	}

	fn issue_command(&mut self, command: Command) {
		self.events.push(Event::Command(command));
		self.status = self.execute(command).err();
		self.command_count += 1;
		self.busy_left = self.busy_polls;
	}

	fn is_busy(&mut self) -> bool {
		if self.stuck_busy {
			return true;
		}
		if self.busy_left > 0 {
			self.busy_left -= 1;
			return true;
		}
		false
	}

	fn error(&mut self) -> Option<BusFault> {
		self.status
	}
}
