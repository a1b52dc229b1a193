use crate::processing::staircase::{Staircase, StaircaseConfig};

use std::os::raw::c_void;

/// Returns a null pointer when the configuration is rejected.
#[no_mangle]
pub extern "C" fn create_staircase(
    start_intensity: f64,
    step_size: f64,
    direction_sign: i32,
    n_up: u32,
    n_down: u32,
    lower_bound: f64,
    upper_bound: f64,
) -> *mut c_void {
    let config = StaircaseConfig {
        start_intensity,
        step_size,
        direction_sign,
        n_up,
        n_down,
        lower_bound,
        upper_bound,
    };
    match Staircase::new(config) {
        Ok(staircase) => Box::into_raw(Box::new(staircase)) as *mut c_void,
        Err(_) => std::ptr::null_mut(),
    }
}

#[no_mangle]
pub extern "C" fn delete_staircase(staircase_ptr: *mut c_void) {
    if !staircase_ptr.is_null() {
        unsafe {
            drop(Box::from_raw(staircase_ptr as *mut Staircase));
        }
    }
}

/// Records the trial outcome and returns the next intensity, or NaN for a null handle.
#[no_mangle]
pub extern "C" fn staircase_update(staircase_ptr: *mut c_void, correct: bool) -> f64 {
    if staircase_ptr.is_null() {
        return f64::NAN;
    }
    let staircase = unsafe { &mut *(staircase_ptr as *mut Staircase) };
    staircase.update(correct)
}

#[no_mangle]
pub extern "C" fn staircase_intensity(staircase_ptr: *const c_void) -> f64 {
    if staircase_ptr.is_null() {
        return f64::NAN;
    }
    let staircase = unsafe { &*(staircase_ptr as *const Staircase) };
    staircase.intensity()
}

#[no_mangle]
pub extern "C" fn staircase_reversals(staircase_ptr: *const c_void) -> usize {
    if staircase_ptr.is_null() {
        return 0;
    }
    let staircase = unsafe { &*(staircase_ptr as *const Staircase) };
    staircase.reversals()
}
