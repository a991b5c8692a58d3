pub trait Read {
    fn read(&mut self, buffer: &mut [u8]) -> crate::Result<usize>;

    fn read_exact(&mut self, mut buffer: &mut [u8]) -> crate::Result<()> {
        while !buffer.is_empty() {
            match self.read(buffer) {
                Ok(0) => return Err(crate::ErrorKind::InvalidData.into()),
                Ok(n) => buffer = &mut buffer[n..],
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

impl Read for &[u8] {
    fn read(&mut self, buffer: &mut [u8]) -> crate::Result<usize> {
        let n = core::cmp::min(self.len(), buffer.len());
        buffer[..n].copy_from_slice(&self[..n]);
        *self = &self[n..];
        Ok(n)
    }
}
