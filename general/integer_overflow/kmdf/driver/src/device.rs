// Copyright (c) Microsoft Corporation.
// License: MIT OR Apache-2.0

use wdk::{nt_success, paged_code, println};
use wdk_sys::{
    call_unsafe_wdf_function_binding,
    ntddk::KeGetCurrentIrql,
    APC_LEVEL,
    NTSTATUS,
    PWDFDEVICE_INIT,
    WDFDEVICE,
    WDFDEVICE_INIT,
    WDF_NO_HANDLE,
    WDF_NO_OBJECT_ATTRIBUTES,
};

use crate::{queue, GUID_DEVINTERFACE_INTEGER_OVERFLOW};

/// Worker routine called to create a device and its software resources.
///
/// The in-caller-context callback is registered before the device is
/// created, so `METHOD_NEITHER` requests are seen while the sender's address
/// space is still current.
///
/// # Arguments:
///
/// * `device_init` - Pointer to an opaque init structure. Memory for this
///   structure will be freed by the framework when the `WdfDeviceCreate`
///   succeeds. So don't access the structure after that point.
///
/// # Return value:
///
/// * `NTSTATUS`
#[link_section = "PAGE"]
pub fn integer_overflow_device_create(device_init: &mut WDFDEVICE_INIT) -> NTSTATUS {
    paged_code!();

    let mut device_init_ptr: PWDFDEVICE_INIT = device_init;
    let mut device = WDF_NO_HANDLE as WDFDEVICE;

    unsafe {
        call_unsafe_wdf_function_binding!(
            WdfDeviceInitSetIoInCallerContextCallback,
            device_init_ptr,
            Some(queue::integer_overflow_evt_io_in_caller_context)
        );
    }

    let mut nt_status = unsafe {
        call_unsafe_wdf_function_binding!(
            WdfDeviceCreate,
            &mut device_init_ptr,
            WDF_NO_OBJECT_ATTRIBUTES,
            &mut device,
        )
    };

    if !nt_success(nt_status) {
        println!("Error: WdfDeviceCreate failed {nt_status:#010X}");
        return nt_status;
    }

    // Create a device interface so that applications can find and talk
    // to us.
    nt_status = unsafe {
        call_unsafe_wdf_function_binding!(
            WdfDeviceCreateDeviceInterface,
            device,
            &GUID_DEVINTERFACE_INTEGER_OVERFLOW,
            core::ptr::null(),
        )
    };

    if !nt_success(nt_status) {
        println!("Error: WdfDeviceCreateDeviceInterface failed {nt_status:#010X}");
        return nt_status;
    }

    unsafe { queue::integer_overflow_queue_initialize(device) }
}
