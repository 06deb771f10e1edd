use std::time::{Duration, Instant};

/// Sleep with better-than-scheduler precision.
///
/// Used between input polls while blocking on a key press, where the
/// default timer granularity (up to 15 ms on some platforms) would smear
/// reaction-time measurements. Each platform gets its native high-
/// resolution wait, with a short spin for the final stretch.
pub fn precise_sleep(duration: Duration) {
    if duration.is_zero() {
        return;
    }
    let deadline = Instant::now() + duration;

    // Coarse wait for all but the last quarter millisecond.
    if let Some(coarse) = duration.checked_sub(Duration::from_micros(250)) {
        platform_sleep(coarse);
    }

    while Instant::now() < deadline {
        std::hint::spin_loop();
    }
}

#[cfg(target_os = "linux")]
fn platform_sleep(duration: Duration) {
    use libc::{CLOCK_MONOTONIC, clock_nanosleep, timespec};

    let request = timespec {
        tv_sec: duration.as_secs() as libc::time_t,
        tv_nsec: duration.subsec_nanos() as libc::c_long,
    };
    unsafe {
        clock_nanosleep(CLOCK_MONOTONIC, 0, &request, std::ptr::null_mut());
    }
}

#[cfg(target_os = "windows")]
fn platform_sleep(duration: Duration) {
    use windows::Win32::Foundation::{CloseHandle, FILETIME};
    use windows::Win32::System::Threading::{
        CreateWaitableTimerW, SetWaitableTimer, WaitForSingleObject,
    };

    unsafe {
        let Ok(timer) = CreateWaitableTimerW(None, true, None) else {
            std::thread::sleep(duration);
            return;
        };
        // Negative due time means relative, in 100 ns units.
        let due = -(duration.as_nanos() as i64 / 100);
        let due_time = FILETIME {
            dwLowDateTime: due as u32,
            dwHighDateTime: (due >> 32) as u32,
        };
        if SetWaitableTimer(timer, &due_time, 0, None, None, false).as_bool() {
            WaitForSingleObject(timer, u32::MAX);
        } else {
            std::thread::sleep(duration);
        }
        CloseHandle(timer);
    }
}

#[cfg(target_os = "macos")]
fn platform_sleep(duration: Duration) {
    use mach2::mach_time::{
        mach_absolute_time, mach_timebase_info, mach_timebase_info_data_t,
    };

    if duration < Duration::from_micros(100) {
        unsafe {
            let start = mach_absolute_time();
            let mut timebase = mach_timebase_info_data_t { numer: 0, denom: 0 };
            mach_timebase_info(&mut timebase);
            let target = duration.as_nanos() as u64 * timebase.denom as u64
                / timebase.numer as u64;
            while mach_absolute_time() - start < target {
                std::hint::spin_loop();
            }
        }
    } else {
        std::thread::sleep(duration);
    }
}

#[cfg(not(any(target_os = "linux", target_os = "windows", target_os = "macos")))]
fn platform_sleep(duration: Duration) {
    std::thread::sleep(duration);
}
