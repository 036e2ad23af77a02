use std::ffi::CString;
use std::fs;
use std::io;
use std::os::unix::io::{
	AsRawFd,
	FromRawFd,
};
use std::ptr;

use libc::{
	MAP_SHARED,
	O_CLOEXEC,
	O_RDONLY,
	O_RDWR,
	O_SYNC,
	PROT_READ,
	PROT_WRITE,
	_SC_PAGESIZE,
	c_void,
	mmap,
	munmap,
	off_t,
	open,
	sysconf,
};

use super::RegisterWindow;

/// Register window mapped from a file (`/dev/mem`, a UIO map, ...).
#[derive(Debug)]
pub struct Mapped {
	area: ptr::NonNull<u8>, // start of the page-aligned mapping
	area_len: usize,
	offset: usize, // of the window within the mapping
	len: usize,
	writable: bool,
}

impl Drop for Mapped {
	fn drop(&mut self) {
		unsafe {
			let res = munmap(
				self.area.as_ptr() as *mut c_void,
				self.area_len,
			);
			if 0 != res {
				panic!("munmap failed: {}", io::Error::last_os_error());
			}
		}
	}
}

impl Mapped {
	fn register(&self, offset: usize) -> *mut u32 {
		assert!(offset & 3 == 0);
		assert!(offset + 3 < self.len);
		unsafe { self.area.as_ptr().add(self.offset + offset) as *mut u32 }
	}
}

impl RegisterWindow for Mapped {
	fn len(&self) -> usize {
		self.len
	}

	fn read_dword(&self, offset: usize) -> u32 {
		u32::from_le(unsafe { ptr::read_volatile(self.register(offset)) })
	}

	fn write_dword(&mut self, offset: usize, data: u32) {
		assert!(self.writable, "register window is mapped read-only");
		unsafe { ptr::write_volatile(self.register(offset), data.to_le()) }
	}
}

// TODO: exclusive open / file locking?
pub fn inner_open(path: &str, base: usize, len: usize, writable: bool) -> io::Result<Mapped> {
	let open_flags = if writable { O_RDWR } else { O_RDONLY } | O_CLOEXEC | O_SYNC;
	let mmap_prot_flags = if writable { PROT_WRITE } else { 0 } | PROT_READ;

	let path = CString::new(path)?;

	let fd = unsafe { open(path.as_ptr(), open_flags) };
	if -1 == fd {
		return Err(io::Error::last_os_error());
	}
	// now get fd managed to prevent resource leak
	let f = unsafe { fs::File::from_raw_fd(fd) };

	let page_size = unsafe { sysconf(_SC_PAGESIZE) };
	assert!(page_size > 0);
	let page_size = page_size as usize;
	let area_base = base & !(page_size - 1);
	let offset = base - area_base;
	let area_len = offset + len;

	let area = unsafe {
		mmap(
			ptr::null_mut(),
			area_len,
			mmap_prot_flags,
			MAP_SHARED,
			f.as_raw_fd(),
			area_base as off_t,
		)
	};

	if area as usize == !0usize {
		return Err(io::Error::last_os_error());
	}
	match ptr::NonNull::new(area as *mut u8) {
		None => panic!("mmap shouldn't return NULL ever"),
		Some(area) => Ok(Mapped {
			area,
			area_len,
			offset,
			len,
			writable,
		}),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn maps_unaligned_window_of_regular_file() {
		let path = std::env::temp_dir().join(format!("at24mac-mapped-{}", std::process::id()));
		{
			let f = fs::File::create(&path).unwrap();
			f.set_len(8192).unwrap();
		}

		let path_str = path.to_str().unwrap();
		{
			let mut window = inner_open(path_str, 0x1010, 0x24, true).unwrap();
			assert_eq!(window.len(), 0x24);
			window.write_dword(0x0c, 0x1234_5678);
			assert_eq!(window.read_dword(0x0c), 0x1234_5678);
		}

		let content = fs::read(&path).unwrap();
		assert_eq!(&content[0x101c..0x1020], &[0x78, 0x56, 0x34, 0x12]);
		fs::remove_file(&path).unwrap();
	}
}
