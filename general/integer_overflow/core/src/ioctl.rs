// Copyright (c) Microsoft Corporation.
// License: MIT OR Apache-2.0

//! Constants shared by the driver and the test application.

use core::fmt;

pub const FILE_DEVICE_UNKNOWN: u32 = 0x0000_0022;
pub const METHOD_NEITHER: u32 = 3;
pub const FILE_ANY_ACCESS: u32 = 0;

/// `CTL_CODE` from `devioctl.h`.
#[must_use]
pub const fn ctl_code(device_type: u32, function: u32, method: u32, access: u32) -> u32 {
    (device_type << 16) | (access << 14) | (function << 2) | method
}

/// Function number of the integer overflow handler.
pub const INTEGER_OVERFLOW_FUNCTION: u32 = 0x809;

/// `METHOD_NEITHER`, so the driver sees the caller's raw pointer.
pub const IOCTL_INTEGER_OVERFLOW: u32 = ctl_code(
    FILE_DEVICE_UNKNOWN,
    INTEGER_OVERFLOW_FUNCTION,
    METHOD_NEITHER,
    FILE_ANY_ACCESS,
);

/// Field layout of a Windows `GUID`, usable from both `wdk_sys` and
/// `windows_sys`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterfaceGuid {
    pub data1: u32,
    pub data2: u16,
    pub data3: u16,
    pub data4: [u8; 8],
}

impl fmt::Display for InterfaceGuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let d = &self.data4;
        write!(
            f,
            "{:08X}-{:04X}-{:04X}-{:02X}{:02X}-{:02X}{:02X}{:02X}{:02X}{:02X}{:02X}",
            self.data1, self.data2, self.data3, d[0], d[1], d[2], d[3], d[4], d[5], d[6], d[7]
        )
    }
}

// {6A1CE3F4-2B7D-4E89-9C05-7F3B1D2A8E61}
pub const GUID_DEVINTERFACE_INTEGER_OVERFLOW: InterfaceGuid = InterfaceGuid {
    data1: 0x6A1C_E3F4,
    data2: 0x2B7D,
    data3: 0x4E89,
    data4: [0x9C, 0x05, 0x7F, 0x3B, 0x1D, 0x2A, 0x8E, 0x61],
};
