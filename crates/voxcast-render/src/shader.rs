//! Shader management.

use crate::error::{RenderError, RenderResult};

/// WGSL source of the ray-march program.
pub const RAYMARCH_WGSL: &str = include_str!("shaders/raymarch.wgsl");

/// Builder for shader modules.
pub struct ShaderBuilder {
    source: Option<String>,
    vertex_entry: String,
    fragment_entry: String,
    label: Option<String>,
}

impl ShaderBuilder {
    /// Creates a new shader builder.
    #[must_use]
    pub fn new() -> Self {
        Self {
            source: None,
            vertex_entry: "vs_main".to_string(),
            fragment_entry: "fs_main".to_string(),
            label: None,
        }
    }

    /// Sets the WGSL source holding both stages.
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Sets the vertex shader entry point.
    pub fn with_vertex_entry(mut self, entry: impl Into<String>) -> Self {
        self.vertex_entry = entry.into();
        self
    }

    /// Sets the fragment shader entry point.
    pub fn with_fragment_entry(mut self, entry: impl Into<String>) -> Self {
        self.fragment_entry = entry.into();
        self
    }

    /// Sets the shader label for debugging.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Vertex entry point name.
    pub fn vertex_entry(&self) -> &str {
        &self.vertex_entry
    }

    /// Fragment entry point name.
    pub fn fragment_entry(&self) -> &str {
        &self.fragment_entry
    }

    /// Builds the shader module (does not create pipeline).
    pub fn build_module(&self, device: &wgpu::Device) -> RenderResult<wgpu::ShaderModule> {
        let source = self.checked_source()?;

        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: self.label.as_deref(),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });

        Ok(module)
    }

    fn checked_source(&self) -> RenderResult<&str> {
        let source = self
            .source
            .as_deref()
            .ok_or_else(|| RenderError::ShaderCompilationFailed("missing shader source".into()))?;

        for entry in [&self.vertex_entry, &self.fragment_entry] {
            if !source.contains(&format!("fn {entry}(")) {
                return Err(RenderError::ShaderCompilationFailed(format!(
                    "entry point '{entry}' not found"
                )));
            }
        }

        Ok(source)
    }
}

impl Default for ShaderBuilder {
    fn default() -> Self {
        Self::new()
    }
}
