//! Raw anonymous mappings straight through the x86_64 Linux syscall ABI.

use std::ptr::NonNull;

const MMAP_SYSCALL: usize = 9;
const MUNMAP_SYSCALL: usize = 11;

const PROT_READ_WRITE: usize = 0x1 | 0x2;
const MAP_PRIVATE_ANONYMOUS: usize = 0x02 | 0x20;

/// Maps `length` fresh read/write bytes, returning the errno on failure.
#[inline(always)]
pub fn mmap_anonymous(length: usize) -> Result<NonNull<u8>, i32> {
    let ret: isize;

    unsafe {
        core::arch::asm!(
            "syscall",
            inlateout("rax") MMAP_SYSCALL => ret,
            in("rdi") 0usize,
            in("rsi") length,
            in("rdx") PROT_READ_WRITE,
            in("r10") MAP_PRIVATE_ANONYMOUS,
            in("r8") -1isize,
            in("r9") 0usize,
            lateout("rcx") _,
            lateout("r11") _,
            options(nostack)
        );
    }
    if ret < 0 {
        return Err(-ret as i32);
    }
    NonNull::new(ret as *mut u8).ok_or(0)
}

#[inline(always)]
pub fn munmap(ptr: NonNull<u8>, length: usize) -> Result<(), i32> {
    let ret: isize;

    unsafe {
        core::arch::asm!(
            "syscall",
            inlateout("rax") MUNMAP_SYSCALL => ret,
            in("rdi") ptr.as_ptr(),
            in("rsi") length,
            lateout("rcx") _,
            lateout("r11") _,
            options(nostack)
        );
    }
    if ret < 0 {
        return Err(-ret as i32);
    }
    Ok(())
}
