//! SD card mount for the logo cache.
//!
//! On-device: mounts the card over SPI at `/sdcard` through the ESP-IDF
//! VFS so the cache can use `std::fs`. On the host: points the cache at
//! a local directory so the same code runs in simulation.

use crate::assets::fs::StdLogoFs;
use crate::error::{Error, Result};

/// Directory under the mount root holding cached logos.
pub const LOGO_DIR: &str = "logos";

#[cfg(target_os = "espidf")]
pub fn mount_logo_fs() -> Result<StdLogoFs> {
    use esp_idf_svc::sys::*;

    // SAFETY: standard VFS FAT mount sequence; the config structs are
    // plain C data and the mount point outlives the process.
    unsafe {
        let mount_config = esp_vfs_fat_sdmmc_mount_config_t {
            format_if_mount_failed: false,
            max_files: 4,
            allocation_unit_size: 16 * 1024,
            disk_status_check_enable: false,
            use_one_fat: false,
        };
        let host = sdmmc_host_t {
            flags: SDMMC_HOST_FLAG_SPI | SDMMC_HOST_FLAG_DEINIT_ARG,
            slot: 1,
            max_freq_khz: SDMMC_FREQ_DEFAULT as i32,
            ..core::mem::zeroed()
        };
        let slot_config = sdspi_device_config_t {
            host_id: spi_host_device_t_SPI2_HOST,
            gpio_cs: 10,
            gpio_cd: -1,
            gpio_wp: -1,
            gpio_int: -1,
            ..core::mem::zeroed()
        };
        let mount_point = b"/sdcard\0";
        let mut card: *mut sdmmc_card_t = core::ptr::null_mut();
        let ret = esp_vfs_fat_sdspi_mount(
            mount_point.as_ptr().cast(),
            &host,
            &slot_config,
            &mount_config,
            &mut card,
        );
        if ret != ESP_OK {
            return Err(Error::Init("sd card mount"));
        }
    }

    StdLogoFs::new(format!("/sdcard/{LOGO_DIR}")).map_err(|_| Error::Init("logo dir create"))
}

/// Host fallback: a directory next to the working directory stands in
/// for the card.
#[cfg(not(target_os = "espidf"))]
pub fn mount_logo_fs() -> Result<StdLogoFs> {
    log::info!("SD(sim): using ./sdcard/{LOGO_DIR}");
    StdLogoFs::new(format!("./sdcard/{LOGO_DIR}")).map_err(|_| Error::Init("logo dir create"))
}
