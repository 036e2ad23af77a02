use at24mac_i2c::identity::{
	ID_ADDRESS,
	MAC_ADDRESS,
	SENTINEL,
};
use at24mac_i2c::sim::{
	Event,
	SimBus,
};
use at24mac_i2c::{
	BusFault,
	Command,
	Controller,
	Identity,
	read_identity,
};

const SERIAL: [u8; 16] = [
	0x0a, 0x70, 0x08, 0x00, 0x52, 0x31, 0x10, 0x48,
	0x4d, 0x33, 0x7f, 0x1c, 0x20, 0x00, 0xa0, 0x01,
];
const MAC: [u8; 6] = [0xfc, 0xc2, 0x3d, 0x0e, 0x42, 0x17];

#[test]
fn reads_serial_and_mac() {
	let mut controller = Controller::new(SimBus::at24mac(&SERIAL, &MAC));
	let mut serial = [0u8; 16];
	let mut mac = [0u8; 6];
	assert!(read_identity(&mut controller, &mut serial, &mut mac));
	assert_eq!(serial, SERIAL);
	assert_eq!(mac, MAC);

	let events = controller.port().events();
	assert_eq!(&events[..3], &[
		Event::SetSlaveAddress { address: 0x58, read: false },
		Event::PutData(0x80),
		Event::Command(Command::SingleSend),
	]);
	let mac_write = events.iter().position(|e| *e == Event::PutData(0x9a)).unwrap();
	assert_eq!(events[mac_write - 1], Event::SetSlaveAddress { address: 0x59, read: false });
	assert_eq!(events[mac_write + 1], Event::Command(Command::SingleSend));
}

#[test]
fn dead_bus_gives_sentinels() {
	let mut controller = Controller::new(SimBus::new());
	let mut serial = [0u8; 16];
	let mut mac = [0x12u8; 6];
	assert!(!read_identity(&mut controller, &mut serial, &mut mac));
	assert_eq!(serial, [SENTINEL; 16]);
	assert_eq!(mac, [SENTINEL; 6]);
}

// the return value only reflects the MAC transaction
#[test]
fn serial_failure_keeps_mac() {
	let mut bus = SimBus::at24mac(&SERIAL, &MAC);
	bus.detach(ID_ADDRESS);
	let mut controller = Controller::new(bus);

	let (identity, ok) = Identity::read(&mut controller);
	assert!(ok);
	assert_eq!(identity.serial, [SENTINEL; 16]);
	assert_eq!(identity.mac, MAC);
	assert!(!identity.has_serial());
}

#[test]
fn mac_failure_keeps_serial() {
	let mut bus = SimBus::at24mac(&SERIAL, &MAC);
	bus.detach(MAC_ADDRESS);
	let mut controller = Controller::new(bus);

	let (identity, ok) = Identity::read(&mut controller);
	assert!(!ok);
	assert_eq!(identity.serial, SERIAL);
	assert_eq!(identity.mac, [SENTINEL; 6]);
}

#[test]
fn partial_serial_is_discarded() {
	let mut bus = SimBus::at24mac(&SERIAL, &MAC);
	// SingleSend, receive start, 14 continues, then the finish fails
	bus.fail_command(16, BusFault::DataNack);
	let mut controller = Controller::new(bus);

	let (identity, ok) = Identity::read(&mut controller);
	assert!(ok);
	assert_eq!(identity.serial, [SENTINEL; 16]);
	assert_eq!(identity.mac, MAC);
}

#[test]
fn display() {
	let mut controller = Controller::new(SimBus::at24mac(&SERIAL, &MAC));
	let (identity, _) = Identity::read(&mut controller);
	assert_eq!(identity.to_string(), "serial 0a700800523110484d337f1c2000a001 MAC fc:c2:3d:0e:42:17");
}
