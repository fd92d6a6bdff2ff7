//! Single-threaded backend: kernels run on the calling thread.

use ndarray::{Axis, Zip};

use super::{resolve, BackendKind, ExecutionBackend, ImageHandle};
use crate::config::DispatchConfig;
use crate::error::{DispatchResult, InitError};
use crate::filters::FilterTable;

#[derive(Debug)]
pub struct SingleBackend {
    filters: FilterTable,
}

impl SingleBackend {
    pub fn initialize(config: &DispatchConfig) -> Result<Self, InitError> {
        if config.filters.is_empty() {
            return Err(InitError::EmptyModule);
        }
        Ok(Self {
            filters: config.filters.clone(),
        })
    }
}

impl ExecutionBackend for SingleBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Single
    }

    fn filters(&self) -> Vec<String> {
        self.filters.names()
    }

    fn invoke(&self, filter: &str, handle: &mut ImageHandle) -> DispatchResult<()> {
        let kernel = resolve(&self.filters, BackendKind::Single, filter, handle)?;
        Zip::from(handle.pixels_mut().lanes_mut(Axis(2))).for_each(|mut px| kernel(&mut px));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::{Dimensions, PixelBuffer};
    use crate::error::DispatchError;

    fn backend() -> SingleBackend {
        SingleBackend::initialize(&DispatchConfig::default()).unwrap()
    }

    #[test]
    fn test_empty_module_fails_init() {
        let config = DispatchConfig::default().with_filters(FilterTable::empty());
        assert_eq!(
            SingleBackend::initialize(&config).unwrap_err(),
            InitError::EmptyModule
        );
    }

    #[test]
    fn test_open_invoke_read_back() {
        let backend = backend();
        let dims = Dimensions::new(2, 1);
        let buffer = PixelBuffer::new(vec![10, 20, 30, 40, 200, 100, 0, 255]);

        let mut handle = backend.open(buffer, dims).unwrap();
        backend.invoke("invert", &mut handle).unwrap();
        let out = backend.read_back(handle).unwrap();

        assert_eq!(out.as_slice(), &[245, 235, 225, 40, 55, 155, 255, 255]);
    }

    #[test]
    fn test_unknown_filter_leaves_handle_untouched() {
        let backend = backend();
        let mut handle = backend
            .open(PixelBuffer::new(vec![1, 2, 3, 4]), Dimensions::new(1, 1))
            .unwrap();

        let err = backend.invoke("melt", &mut handle).unwrap_err();
        assert_eq!(
            err,
            DispatchError::unknown_filter(BackendKind::Single, "melt")
        );
        assert_eq!(backend.read_back(handle).unwrap().as_slice(), &[1, 2, 3, 4]);
    }

    #[test]
    fn test_filters_lists_module() {
        assert!(backend().filters().contains(&"sepia".to_string()));
    }
}
