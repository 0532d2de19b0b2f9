pub mod message_list;
pub mod message_view;
pub mod sidebar;
