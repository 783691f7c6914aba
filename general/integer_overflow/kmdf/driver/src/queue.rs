// Copyright (c) Microsoft Corporation.
// License: MIT OR Apache-2.0

use integer_overflow_core::{dispatch, ioctl::IOCTL_INTEGER_OVERFLOW, BufferLength, ControlRequest};
use wdk::{nt_success, paged_code, println};
use wdk_sys::{
    call_unsafe_wdf_function_binding,
    ntddk::KeGetCurrentIrql,
    APC_LEVEL,
    NTSTATUS,
    STATUS_INVALID_DEVICE_REQUEST,
    STATUS_SUCCESS,
    ULONG,
    WDFDEVICE,
    WDFQUEUE,
    WDFREQUEST,
    WDF_IO_QUEUE_CONFIG,
    WDF_NO_HANDLE,
    WDF_NO_OBJECT_ATTRIBUTES,
    WDF_REQUEST_PARAMETERS,
    _WDF_IO_QUEUE_DISPATCH_TYPE,
    _WDF_REQUEST_TYPE,
    _WDF_TRI_STATE,
};

use crate::{ENGINE, WDF_IO_QUEUE_CONFIG_SIZE, WDF_REQUEST_PARAMETERS_SIZE};

/// Configures a default sequential queue.
///
/// The integer overflow IOCTL is completed in
/// [`integer_overflow_evt_io_in_caller_context`], so everything that reaches
/// this queue is a request the driver does not support.
///
/// # Arguments:
///
/// * `device` - Handle to a framework device object.
///
/// # Return value:
///
/// * `NTSTATUS`
#[link_section = "PAGE"]
pub unsafe fn integer_overflow_queue_initialize(device: WDFDEVICE) -> NTSTATUS {
    let mut queue = WDF_NO_HANDLE as WDFQUEUE;

    paged_code!();

    let mut queue_config = WDF_IO_QUEUE_CONFIG {
        Size: WDF_IO_QUEUE_CONFIG_SIZE,
        PowerManaged: _WDF_TRI_STATE::WdfUseDefault,
        DefaultQueue: u8::from(true),
        DispatchType: _WDF_IO_QUEUE_DISPATCH_TYPE::WdfIoQueueDispatchSequential,
        EvtIoDeviceControl: Some(integer_overflow_evt_io_device_control),
        ..WDF_IO_QUEUE_CONFIG::default()
    };

    let nt_status = unsafe {
        call_unsafe_wdf_function_binding!(
            WdfIoQueueCreate,
            device,
            &mut queue_config,
            WDF_NO_OBJECT_ATTRIBUTES,
            &mut queue
        )
    };

    if !nt_success(nt_status) {
        println!("WdfIoQueueCreate failed {nt_status:#010X}");
        return nt_status;
    }

    STATUS_SUCCESS
}

/// Called by the framework for every request before it is queued, in the
/// context of the thread that sent it.
///
/// `IOCTL_INTEGER_OVERFLOW` is handled and completed here, since its
/// `Type3InputBuffer` is only valid in the sender's address space. Anything
/// else is handed back to the framework for queuing.
///
/// # Arguments:
///
/// * `device` - Handle to the framework device object.
/// * `request` - Handle to a framework request object.
///
/// # Return value:
///
/// * `VOID`
#[link_section = "PAGE"]
pub extern "C" fn integer_overflow_evt_io_in_caller_context(device: WDFDEVICE, request: WDFREQUEST) {
    paged_code!();

    let mut params = WDF_REQUEST_PARAMETERS {
        Size: WDF_REQUEST_PARAMETERS_SIZE,
        ..WDF_REQUEST_PARAMETERS::default()
    };

    unsafe {
        call_unsafe_wdf_function_binding!(WdfRequestGetParameters, request, &mut params);
    }

    let is_integer_overflow = params.Type == _WDF_REQUEST_TYPE::WdfRequestTypeDeviceControl
        // SAFETY: `Type` says the DeviceIoControl arm of the union is the one WDF filled in.
        && unsafe { params.Parameters.DeviceIoControl.IoControlCode } == IOCTL_INTEGER_OVERFLOW;

    if !is_integer_overflow {
        let nt_status =
            unsafe { call_unsafe_wdf_function_binding!(WdfDeviceEnqueueRequest, device, request) };
        if !nt_success(nt_status) {
            println!("WdfDeviceEnqueueRequest failed {nt_status:#010X}");
            unsafe {
                call_unsafe_wdf_function_binding!(WdfRequestComplete, request, nt_status);
            }
        }
        return;
    }

    println!("****** IOCTL_INTEGER_OVERFLOW ******");

    // SAFETY: checked above that this is a device control request.
    let (source, input_length) = unsafe {
        (
            params.Parameters.DeviceIoControl.Type3InputBuffer,
            params.Parameters.DeviceIoControl.InputBufferLength,
        )
    };

    // The I/O manager stores InputBufferLength as a ULONG, WDF widens it.
    let control_request = ControlRequest::new(
        source.cast_const(),
        BufferLength::try_from(input_length).unwrap_or(BufferLength::MAX),
    );

    // SAFETY: this runs in the sender's context, so a pointer that passes the
    // user range probe refers to the sender's memory. Whether the copy stays
    // inside the stack buffer is decided by the configured size policy.
    let status = unsafe { dispatch(&ENGINE, &control_request) };

    println!("****** IOCTL_INTEGER_OVERFLOW ****** {status}");

    unsafe {
        call_unsafe_wdf_function_binding!(WdfRequestComplete, request, status.as_ntstatus());
    }
}

/// This event is invoked for device control requests that were not handled
/// in caller context.
///
/// # Arguments:
///
/// * `_queue` - Handle to the framework queue object that is associated with
///   the I/O request.
/// * `request` - Handle to a framework request object.
/// * `_output_buffer_length` - Length of the request's output buffer.
/// * `_input_buffer_length` - Length of the request's input buffer.
/// * `io_control_code` - The driver-defined or system-defined I/O control
///   code.
///
/// # Return value:
///
/// * `VOID`
extern "C" fn integer_overflow_evt_io_device_control(
    _queue: WDFQUEUE,
    request: WDFREQUEST,
    _output_buffer_length: usize,
    _input_buffer_length: usize,
    io_control_code: ULONG,
) {
    println!("Invalid IOCTL code: {io_control_code:#010X}");

    unsafe {
        call_unsafe_wdf_function_binding!(
            WdfRequestComplete,
            request,
            STATUS_INVALID_DEVICE_REQUEST
        );
    }
}
