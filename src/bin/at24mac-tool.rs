#[macro_use]
extern crate clap;
#[macro_use]
extern crate failure;
#[macro_use]
extern crate log;

extern crate at24mac_i2c;
use at24mac_i2c::*;

use std::process::exit;

use at24mac_i2c::eeprom::{
	self,
	Eeprom,
};
use at24mac_i2c::mmio::{
	self,
	BusSpeed,
	ControllerConfig,
};
use at24mac_i2c::sim::SimBus;

// contents of the simulated ID chip
const DEMO_SERIAL: [u8; 16] = [
	0x0a, 0x70, 0x08, 0x00, 0x52, 0x31, 0x10, 0x48,
	0x4d, 0x33, 0x7f, 0x1c, 0x20, 0x00, 0xa0, 0x00,
];
const DEMO_MAC: [u8; 6] = [0xfc, 0xc2, 0x3d, 0x0e, 0x42, 0x17];

fn parse_number(value: &str) -> AResult<usize> {
	let result = if value.starts_with("0x") || value.starts_with("0X") {
		usize::from_str_radix(&value[2..], 16)
	} else {
		value.parse::<usize>()
	};
	result.map_err(|e| format_err!("invalid number {:?}: {}", value, e))
}

fn get_param<T>(matches: &clap::ArgMatches, name: &str) -> AResult<T>
where
	T: std::str::FromStr,
	failure::Error: From<<T as std::str::FromStr>::Err>,
{
	let param = match matches.value_of(name) {
		Some(p) => p,
		None => bail!("missing parameter {}", name),
	};
	param.parse::<T>().map_err(|e| {
		let e = failure::Error::from(e);
		let msg = format!("invalid paramater {}: {}", name, e);
		e.context(msg).into()
	})
}

fn get_number(matches: &clap::ArgMatches, name: &str) -> AResult<usize> {
	match matches.value_of(name) {
		Some(p) => param_context(name, parse_number(p)),
		None => bail!("missing parameter {}", name),
	}
}

fn param_context<T>(name: &str, result: AResult<T>) -> AResult<T> {
	result.map_err(|e| {
		let msg = format!("invalid paramater {}: {}", name, e);
		e.context(msg).into()
	})
}

fn hex_digit(c: char) -> AResult<u8> {
	match c.to_digit(16) {
		Some(d) => Ok(d as u8),
		None => bail!("invalid hex digit {:?}", c),
	}
}

fn parse_hex(data: &str) -> AResult<Vec<u8>> {
	let digits = data.chars()
		.filter(|c| !c.is_whitespace() && *c != ':')
		.map(hex_digit)
		.collect::<AResult<Vec<u8>>>()?;
	ensure!(0 == digits.len() % 2, "odd number of hex digits");
	Ok(digits.chunks(2).map(|pair| pair[0] << 4 | pair[1]).collect())
}

fn hexdump(base: usize, data: &[u8]) {
	for (i, b) in data.iter().enumerate() {
		if 0 == i % 16 {
			print!("{:02x}:", base + i);
		} else if 0 == i % 8 {
			print!(" ");
		}
		print!(" {:02x}", b);
		if 15 == i % 16 {
			println!("");
		}
	}
	if 0 != data.len() % 16 {
		println!("");
	}
}

fn identity<P: ControllerPort>(controller: &mut Controller<P>) -> AResult<()> {
	let (identity, ok) = Identity::read(controller);
	println!("serial: {}", identity.serial_hex());
	println!("MAC:    {}", identity.mac_string());
	if !ok || !identity.has_serial() {
		error!("identity incomplete (0xff marks unreadable bytes)");
		exit(2);
	}
	Ok(())
}

fn read<P: ControllerPort>(controller: &mut Controller<P>, sub_m: &clap::ArgMatches) -> AResult<()> {
	let offset = get_number(sub_m, "OFFSET")?;
	let length = get_number(sub_m, "LENGTH")?;
	eeprom::check_range(offset, length)?;

	let mut data = vec![0u8; length];
	Eeprom::new(controller).read(offset, &mut data)?;
	hexdump(offset, &data);
	Ok(())
}

fn write<P: ControllerPort>(controller: &mut Controller<P>, sub_m: &clap::ArgMatches) -> AResult<()> {
	let offset = get_number(sub_m, "OFFSET")?;
	let data = param_context("DATA", parse_hex(sub_m.value_of("DATA").unwrap_or("")))?;

	let mut eeprom = Eeprom::new(controller);
	eeprom.write(offset, &data)?;

	let mut verify = vec![0u8; data.len()];
	eeprom.read(offset, &mut verify)?;
	for (i, (&w, &r)) in data.iter().zip(verify.iter()).enumerate() {
		ensure!(w == r,
			"Verify failed at {:02x}: expected {:02x}, EEPROM has {:02x}", offset + i, w, r
		);
	}
	info!("wrote {} bytes at 0x{:02x}", data.len(), offset);
	Ok(())
}

fn probe<P: ControllerPort>(controller: &mut Controller<P>, sub_m: &clap::ArgMatches) -> AResult<()> {
	let address = get_number(sub_m, "ADDRESS")?;
	ensure!(address < 0x80, "not a 7-bit slave address: 0x{:x}", address);

	let mut data = [0u8; 1];
	match controller.try_transfer(&mut Transaction::read(address as u8, &mut data)) {
		Ok(()) => println!("0x{:02x}: ACK", address),
		Err(e) => {
			println!("0x{:02x}: no answer", address);
			debug!("{}", e);
		},
	}
	Ok(())
}

fn run<P: ControllerPort>(mut controller: Controller<P>, matches: &clap::ArgMatches) -> AResult<()> {
	match matches.subcommand() {
		("identity", _) => identity(&mut controller),
		("read", Some(sub_m)) => read(&mut controller, sub_m),
		("write", Some(sub_m)) => write(&mut controller, sub_m),
		("probe", Some(sub_m)) => probe(&mut controller, sub_m),
		("", _) => bail!("no subcommand"),
		(cmd, _) => bail!("not implemented subcommand {:?}", cmd),
	}
}

fn controller_config(matches: &clap::ArgMatches) -> AResult<ControllerConfig> {
	let mut config = ControllerConfig::default();
	if matches.is_present("sysclk") {
		config.system_clock = get_param(matches, "sysclk")?;
	}
	if matches.is_present("fast") {
		config.bus_speed = BusSpeed::Fast;
	}
	if matches.is_present("busy_limit") {
		let limit: u32 = get_param(matches, "busy_limit")?;
		ensure!(0 != limit, "busy limit must be at least 1");
		config.busy_limit = Some(limit);
	}
	Ok(config)
}

fn app() -> clap::App<'static, 'static> {
	clap_app!(@app (app_from_crate!())
		(@setting SubcommandRequiredElseHelp)
		(global_setting: clap::AppSettings::VersionlessSubcommands)
		(@arg simulate: -s --simulate "use a simulated bus with an AT24MAC chip instead of hardware")
		(@arg device: -d --device +takes_value "file to map the controller registers from (default /dev/mem)")
		(@arg base: -b --base +takes_value "physical address of the controller register block")
		(@arg sysclk: --sysclk +takes_value "I2C module clock in Hz")
		(@arg fast: --fast "use 400 kHz fast mode")
		(@arg busy_limit: --("busy-limit") +takes_value "give up a bus step after this many busy polls")
		(@subcommand identity =>
			(about: "read serial number and MAC address")
		)
		(@subcommand read =>
			(about: "hexdump EEPROM contents")
			(@arg OFFSET: +required "first byte to read")
			(@arg LENGTH: +required "number of bytes")
		)
		(@subcommand write =>
			(about: "write and verify EEPROM contents")
			(@arg OFFSET: +required "first byte to write")
			(@arg DATA: +required "hex encoded data")
		)
		(@subcommand probe =>
			(about: "check whether a slave answers on an address")
			(@arg ADDRESS: +required "7-bit slave address")
		)
	)
}

fn main_app() -> AResult<()> {
	let matches = app().get_matches();

	let config = controller_config(&matches)?;

	if matches.is_present("simulate") {
		let mut controller = Controller::new(SimBus::at24mac(&DEMO_SERIAL, &DEMO_MAC));
		controller.set_busy_limit(config.busy_limit);
		return run(controller, &matches);
	}

	let device = matches.value_of("device").unwrap_or("/dev/mem");
	let base = get_number(&matches, "base")?;
	let controller = mmio::open_controller(device, base, &config)?;
	run(controller, &matches)
}

fn main() {
	env_logger::from_env(env_logger::Env::default().default_filter_or("info")).init();

	if let Err(e) = main_app() {
		error!("Error: {}", e);
		exit(1);
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn config_for(args: &[&str]) -> AResult<ControllerConfig> {
		let matches = app().get_matches_from_safe(args)?;
		controller_config(&matches)
	}

	#[test]
	fn hex_input() {
		assert_eq!(parse_hex("de:ad be EF").unwrap(), vec![0xde, 0xad, 0xbe, 0xef]);
		assert!(parse_hex("abc").is_err());
		assert!(parse_hex("aéb").is_err());
		assert!(parse_hex("zz").is_err());
	}

	#[test]
	fn busy_limit_option() {
		let config = config_for(&["at24mac-tool", "--busy-limit", "50", "identity"]).unwrap();
		assert_eq!(config.busy_limit, Some(50));
		assert!(config_for(&["at24mac-tool", "--busy-limit", "0", "identity"]).is_err());
		assert_eq!(config_for(&["at24mac-tool", "identity"]).unwrap().busy_limit, None);
	}

	#[test]
	fn huge_read_is_range_error() {
		let matches = app().get_matches_from_safe(&["at24mac-tool", "read", "0", "0xffffffffffff"]).unwrap();
		let sub_m = matches.subcommand_matches("read").unwrap();
		let mut controller = Controller::new(SimBus::at24mac(&DEMO_SERIAL, &DEMO_MAC));
		assert!(read(&mut controller, sub_m).is_err());
		assert!(controller.port().events().is_empty());
	}
}
