// Copyright (c) Microsoft Corporation
// License: MIT OR Apache-2.0

//! Test application for the integer overflow sample driver.
//!
//! Sends one `IOCTL_INTEGER_OVERFLOW` request whose payload and declared
//! length are chosen on the command line. Whether an oversized length is
//! rejected or overflows the driver's stack buffer depends on whether the
//! driver was built with the `secure` feature.
#![deny(missing_docs)]
#![deny(unsafe_op_in_unsafe_fn)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![deny(clippy::nursery)]
#![deny(clippy::cargo)]
#![deny(clippy::undocumented_unsafe_blocks)]

use std::{env, error::Error, ffi::OsString, os::windows::prelude::*, sync::RwLock};

use integer_overflow_core::{
    ioctl::{GUID_DEVINTERFACE_INTEGER_OVERFLOW, IOCTL_INTEGER_OVERFLOW},
    BufferLength,
    Element,
    BUFFER_SIZE,
    BUFFER_TERMINATOR,
    MAX_ALLOWED_LENGTH,
};
use once_cell::sync::Lazy;
use uuid::Uuid;
use windows_sys::Win32::{
    Devices::DeviceAndDriverInstallation,
    Foundation::{CloseHandle, GetLastError, BOOL, FALSE, HANDLE, INVALID_HANDLE_VALUE},
    Storage::FileSystem::{
        CreateFileW,
        FILE_GENERIC_READ,
        FILE_GENERIC_WRITE,
        FILE_SHARE_READ,
        FILE_SHARE_WRITE,
        OPEN_EXISTING,
    },
    System::IO::DeviceIoControl,
};

/// What the request looks like.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scenario {
    /// Fills all but the last word, the largest length both checks accept.
    WellFormed,
    /// Terminator at the given word, declared length still the maximum.
    Terminator(usize),
    /// Length 0xFFFFFFFF, payload four words longer than the driver buffer.
    Overflow,
    /// Caller chosen length over a full pattern payload.
    Length(BufferLength),
}

#[derive(Debug)]
struct Globals {
    scenario: Scenario,
    device_path: String,
}

impl Default for Globals {
    fn default() -> Self {
        Self {
            scenario: Scenario::WellFormed,
            device_path: String::new(),
        }
    }
}

static GLOBAL_DATA: Lazy<RwLock<Globals>> = Lazy::new(|| RwLock::new(Globals::default()));
static OVERFLOW_FILL: Element = 0x4141_4141;

fn main() -> Result<(), Box<dyn Error>> {
    let argument_vector: Vec<String> = env::args().collect();

    let scenario = match argument_vector.get(1).map(String::as_str) {
        None => Scenario::WellFormed,
        Some("-Overflow") => Scenario::Overflow,
        Some("-Terminator") if argument_vector.len() > 2 => {
            let at = argument_vector[2].parse::<usize>()?;
            if at >= BUFFER_SIZE {
                return Err(format!("Terminator index must be below {BUFFER_SIZE}").into());
            }
            Scenario::Terminator(at)
        }
        Some("-Length") if argument_vector.len() > 2 => {
            Scenario::Length(parse_length(&argument_vector[2])?)
        }
        Some(_) => {
            eprintln!(
                r##"
Usage:
    intovfapp.exe                  --- Send {MAX_ALLOWED_LENGTH} bytes, accepted by both size checks
    intovfapp.exe -Terminator <k>  --- Same length, terminator at word <k>
    intovfapp.exe -Overflow        --- Declare 0xFFFFFFFF bytes
    intovfapp.exe -Length <n>      --- Declare <n> bytes (decimal or 0x hex)
"##
            );
            return Err("Invalid Args".into());
        }
    };
    GLOBAL_DATA.write()?.scenario = scenario;

    let interface_guid = Uuid::from_fields(
        GUID_DEVINTERFACE_INTEGER_OVERFLOW.data1,
        GUID_DEVINTERFACE_INTEGER_OVERFLOW.data2,
        GUID_DEVINTERFACE_INTEGER_OVERFLOW.data3,
        &GUID_DEVINTERFACE_INTEGER_OVERFLOW.data4,
    );
    get_device_path(&interface_guid)?;

    let globals = GLOBAL_DATA.read()?;
    println!("DevicePath: {}", globals.device_path);
    let mut path_vec = globals.device_path.encode_utf16().collect::<Vec<_>>();
    let scenario = globals.scenario;
    drop(globals);

    let h_device: HANDLE;
    path_vec.push(0);
    let path = path_vec.as_ptr();

    // SAFETY:
    // Call Win32 API FFI CreateFileW to access driver
    unsafe {
        h_device = CreateFileW(
            path,
            FILE_GENERIC_READ | FILE_GENERIC_WRITE,
            FILE_SHARE_READ | FILE_SHARE_WRITE,
            std::ptr::null(),
            OPEN_EXISTING,
            0,
            std::ptr::null_mut(),
        );
    }

    if h_device == INVALID_HANDLE_VALUE {
        // SAFETY:
        // Call Win32 API FFI GetLastError() to check for any errors
        let error = unsafe { GetLastError() };
        return Err(format!("Failed to open device. Error {error}").into());
    }

    println!("Opened device successfully");

    let result = send_integer_overflow_request(h_device, scenario);

    // SAFETY:
    // Call Win32 API FFI CloseHandle to close device handle
    unsafe {
        CloseHandle(h_device);
    }

    result
}

fn parse_length(text: &str) -> Result<BufferLength, Box<dyn Error>> {
    let length = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => BufferLength::from_str_radix(hex, 16)?,
        None => text.parse::<BufferLength>()?,
    };
    Ok(length)
}

/// Builds the payload and the declared length for `scenario`.
fn build_request(scenario: Scenario) -> (Vec<Element>, BufferLength) {
    let pattern = |len: usize| {
        (0..)
            .take(len)
            .map(|i: Element| 0x1000_0000 | i)
            .collect::<Vec<_>>()
    };

    match scenario {
        Scenario::WellFormed => (pattern(BUFFER_SIZE), MAX_ALLOWED_LENGTH),
        Scenario::Terminator(at) => {
            let mut words = pattern(BUFFER_SIZE);
            words[at] = BUFFER_TERMINATOR;
            (words, MAX_ALLOWED_LENGTH)
        }
        Scenario::Overflow => {
            let mut words = vec![OVERFLOW_FILL; BUFFER_SIZE + 4];
            words.push(BUFFER_TERMINATOR);
            (words, BufferLength::MAX)
        }
        Scenario::Length(length) => {
            let mut words = pattern(BUFFER_SIZE);
            words.push(BUFFER_TERMINATOR);
            (words, length)
        }
    }
}

fn send_integer_overflow_request(
    h_device: HANDLE,
    scenario: Scenario,
) -> Result<(), Box<dyn Error>> {
    let (payload, declared_length) = build_request(scenario);
    let mut bytes_returned: u32 = 0;
    let r: BOOL;

    println!(
        "{scenario:?}: {} payload words, declared length {declared_length:#X}",
        payload.len()
    );

    // SAFETY:
    // Call Win32 API FFI DeviceIoControl. The declared length is deliberately
    // not the payload length; METHOD_NEITHER passes both through unchecked.
    unsafe {
        r = DeviceIoControl(
            h_device,
            IOCTL_INTEGER_OVERFLOW,
            payload.as_ptr().cast(),
            declared_length,
            std::ptr::null_mut(),
            0,
            &mut bytes_returned,
            std::ptr::null_mut(),
        );
    }

    if r == FALSE {
        // SAFETY:
        // Call Win32 API FFI GetLastError() to check for any errors from
        // DeviceIoControl
        let error = unsafe { GetLastError() };
        return Err(format!("DeviceIoControl failed: Error {error}").into());
    }

    println!("DeviceIoControl succeeded");

    Ok(())
}

fn get_device_path(interface_guid: &Uuid) -> Result<(), Box<dyn Error>> {
    let mut guid = windows_sys::core::GUID {
        data1: 0,
        data2: 0,
        data3: 0,
        data4: [0, 0, 0, 0, 0, 0, 0, 0],
    };
    let guid_data4: &[u8; 8];
    let mut device_interface_list_length: u32 = 0;
    let mut config_ret;

    (guid.data1, guid.data2, guid.data3, guid_data4) = interface_guid.as_fields();
    guid.data4 = *guid_data4;

    // SAFETY:
    // Call Win32 API FFI CM_Get_Device_Interface_List_SizeW to determine size of
    // space needed for a subsequent request
    unsafe {
        config_ret = DeviceAndDriverInstallation::CM_Get_Device_Interface_List_SizeW(
            &mut device_interface_list_length,
            &guid,
            std::ptr::null(),
            DeviceAndDriverInstallation::CM_GET_DEVICE_INTERFACE_LIST_PRESENT,
        );
    }

    if config_ret != DeviceAndDriverInstallation::CR_SUCCESS {
        return Err(
            format!("Error 0x{config_ret:08X} retrieving device interface list size.",).into(),
        );
    }

    if device_interface_list_length <= 1 {
        return Err(
            "Error: No active device interfaces found.  Is the sample driver loaded?".into(),
        );
    }

    let mut buffer: Vec<u16> = vec![0; usize::try_from(device_interface_list_length)?];
    let buffer_ptr = buffer.as_mut_ptr();

    // SAFETY:
    // Call Win32 API FFI CM_Get_Device_Interface_ListW to get the list of Device
    // Interfaces that match the Interface GUID for the integer overflow driver
    unsafe {
        config_ret = DeviceAndDriverInstallation::CM_Get_Device_Interface_ListW(
            &guid,
            std::ptr::null(),
            buffer_ptr,
            device_interface_list_length,
            DeviceAndDriverInstallation::CM_GET_DEVICE_INTERFACE_LIST_PRESENT,
        );
    }

    if config_ret != DeviceAndDriverInstallation::CR_SUCCESS {
        return Err(format!("Error 0x{config_ret:08X} retrieving device interface list.").into());
    }

    // The list is a multi-sz; the first entry is the one we want.
    let first = buffer.split(|&c| c == 0).next().unwrap_or_default();
    let path = OsString::from_wide(first);

    GLOBAL_DATA.write()?.device_path = path
        .into_string()
        .map_err(|_| "Device path is not valid Unicode")?;

    Ok(())
}
