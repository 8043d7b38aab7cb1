// Shared memory backend tests for Linux
// Run with: cargo test --test shared_memory -- --nocapture

#[cfg(target_os = "linux")]
mod linux_tests {
    use evpipe::Core::{attach_shared_memory, create_shared_memory, heap_memory, RawHandle, SharedMemoryBackend};
    use evpipe::Core::SharedMemory::SEGMENT_ALIGN;

    #[test]
    fn test_create_shared_memory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("segment");
        let size = 4096;
        let shm = create_shared_memory(&path, size).unwrap();

        assert_eq!(shm.size(), size);
        assert!(!shm.as_ptr().is_null());
        assert_eq!(std::fs::metadata(&path).unwrap().len(), size as u64);

        unsafe {
            let slice = std::slice::from_raw_parts_mut(shm.as_ptr(), size);
            assert!(slice.iter().all(|&b| b == 0), "new segments start zeroed");
            slice[0] = 0x42;
            assert_eq!(slice[0], 0x42);
        }
    }

    #[test]
    fn test_zero_size_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = create_shared_memory(&dir.path().join("empty"), 0).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidInput);
    }

    #[test]
    fn test_attach_sees_writes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shared");
        let size = 8192;
        let owner = create_shared_memory(&path, size).unwrap();
        let peer = attach_shared_memory(&path, size).unwrap();
        assert_eq!(peer.size(), size);

        unsafe {
            let a = std::slice::from_raw_parts_mut(owner.as_ptr(), size);
            for (i, b) in a.iter_mut().enumerate().take(100) {
                *b = (i % 256) as u8;
            }
            let b = std::slice::from_raw_parts(peer.as_ptr(), size);
            for (i, &v) in b.iter().enumerate().take(100) {
                assert_eq!(v, (i % 256) as u8);
            }
        }
    }

    #[test]
    fn test_attach_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = attach_shared_memory(&dir.path().join("missing"), 16).unwrap_err();
        assert_eq!(missing.kind(), std::io::ErrorKind::NotFound);

        let path = dir.path().join("small");
        let _owner = create_shared_memory(&path, 1024).unwrap();
        let small = attach_shared_memory(&path, 4096).unwrap_err();
        assert_eq!(small.kind(), std::io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_raw_handle() {
        let dir = tempfile::tempdir().unwrap();
        let shm = create_shared_memory(&dir.path().join("handle"), 4096).unwrap();
        match shm.raw_handle() {
            RawHandle::Fd(fd) => assert!(fd > 0, "File descriptor should be positive"),
            RawHandle::Heap => panic!("file segment reported a heap handle"),
        }

        let heap = heap_memory(4096).unwrap();
        assert!(matches!(heap.raw_handle(), RawHandle::Heap));
    }

    #[test]
    fn test_alignment() {
        let dir = tempfile::tempdir().unwrap();
        let shm = create_shared_memory(&dir.path().join("aligned"), 4096).unwrap();
        assert_eq!(shm.as_ptr() as usize % SEGMENT_ALIGN, 0);

        for size in [1, 100, 4096, 1 << 20] {
            let heap = heap_memory(size).unwrap();
            assert_eq!(heap.as_ptr() as usize % SEGMENT_ALIGN, 0);
            assert_eq!(heap.size(), size);
            let bytes = unsafe { std::slice::from_raw_parts(heap.as_ptr(), size) };
            assert!(bytes.iter().all(|&b| b == 0));
        }
    }
}
