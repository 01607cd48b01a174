use marrowos_shared::sizes::SECTOR_SIZE;

/// Size of a block device sector in bytes.
///
/// All IDE disks use this sector size, as do most USB and SCSI disks.
pub const BLOCK_SECTOR_SIZE: usize = SECTOR_SIZE;

/// Index of a block device sector.
///
/// Good enough for devices up to 2 TB.
pub type BlockSector = u32;

/// Lower-level interface to block device drivers.
pub trait BlockOp: Send + Sync {
    /// Reads sector `sector` into `buf`, which must hold `BLOCK_SECTOR_SIZE`
    /// bytes.
    fn read(&self, sector: BlockSector, buf: &mut [u8]);

    /// Writes `buf`, which must hold `BLOCK_SECTOR_SIZE` bytes, to sector
    /// `sector`. Returns after the device has acknowledged the data.
    fn write(&self, sector: BlockSector, buf: &[u8]);

    /// Size of the device in sectors.
    fn size(&self) -> BlockSector;
}
