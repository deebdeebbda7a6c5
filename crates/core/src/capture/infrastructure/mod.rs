pub mod still_image_camera;
