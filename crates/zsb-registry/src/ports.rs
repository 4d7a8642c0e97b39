use std::collections::BTreeSet;
use std::sync::Mutex;
use zsb_core::Port;

/// Raised when every port in the configured range is in use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortsExhausted;

impl std::fmt::Display for PortsExhausted {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "no free ports in range")
    }
}

impl std::error::Error for PortsExhausted {}

/// Allocates match-server ports from a contiguous range.
/// Allocation and release are mutually exclusive; exhaustion is an error,
/// never a blocking wait.
pub struct PortPool {
    base: Port,
    count: usize,
    used: Mutex<BTreeSet<Port>>,
}

impl PortPool {
    pub fn new(base: Port, count: usize) -> Self {
        Self {
            base,
            count,
            used: Mutex::new(BTreeSet::new()),
        }
    }
    /// Returns the smallest unused port in `[base, base + count)`.
    pub fn allocate(&self) -> Result<Port, PortsExhausted> {
        let mut used = self.used.lock().expect("port pool lock");
        (0..self.count)
            .map(|i| self.base + i as Port)
            .find(|p| !used.contains(p))
            .inspect(|p| {
                used.insert(*p);
            })
            .ok_or(PortsExhausted)
    }
    /// Marks a port free. Releasing an unallocated port is a silent no-op.
    pub fn release(&self, port: Port) {
        self.used.lock().expect("port pool lock").remove(&port);
    }
    /// Number of ports currently handed out.
    pub fn in_use(&self) -> usize {
        self.used.lock().expect("port pool lock").len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn allocates_smallest_first() {
        let pool = PortPool::new(27015, 4);
        assert_eq!(pool.allocate(), Ok(27015));
        assert_eq!(pool.allocate(), Ok(27016));
        pool.release(27015);
        assert_eq!(pool.allocate(), Ok(27015));
    }
    #[test]
    fn exhaustion_is_an_error_not_a_reuse() {
        let pool = PortPool::new(27015, 2);
        assert!(pool.allocate().is_ok());
        assert!(pool.allocate().is_ok());
        assert_eq!(pool.allocate(), Err(PortsExhausted));
    }
    #[test]
    fn release_of_unallocated_port_is_noop() {
        let pool = PortPool::new(27015, 2);
        pool.release(27099);
        assert_eq!(pool.in_use(), 0);
        assert_eq!(pool.allocate(), Ok(27015));
    }
}
